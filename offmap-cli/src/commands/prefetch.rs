//! `prefetch` - download a region for offline use.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use offmap::prefetch::FetchCallbacks;

use crate::commands::common::GlobalArgs;
use crate::error::CliError;

pub async fn run(
    global: &GlobalArgs,
    lat: f64,
    lon: f64,
    radius: Option<f64>,
) -> Result<(), CliError> {
    let map = global.open().await?;
    let radius = radius.unwrap_or(map.config().radius_m);

    println!(
        "Prefetching {:.0} m around ({:.6}, {:.6}) at zoom {:?}",
        radius,
        lat,
        lon,
        map.config().zoom_levels
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} tiles ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let callbacks = FetchCallbacks::new().on_progress({
        let pb = pb.clone();
        move |completed, total| {
            pb.set_length(total as u64);
            pb.set_position(completed as u64);
        }
    });

    let job = map.prefetch_region(lat, lon, radius, callbacks).await?;
    let summary = job.join().await.map_err(offmap::app::AppError::from)?;
    pb.finish_and_clear();

    let line = format!("Done: {}", summary);
    if summary.failed == 0 {
        println!("{}", style(line).green());
    } else {
        println!("{}", style(line).yellow());
    }
    Ok(())
}
