//! `serve` - run the local tile server until Ctrl-C.

use console::style;
use tracing::info;

use crate::commands::common::GlobalArgs;
use crate::error::CliError;

pub async fn run(global: &GlobalArgs) -> Result<(), CliError> {
    let map = global.open().await?;
    let addr = map.serve().await?;

    if !map.has_cached_tiles().await {
        println!(
            "{}",
            style("Cache is empty; every tile request will 404 until a region is prefetched.")
                .yellow()
        );
    }
    println!("Serving {} on http://{}", map.store().root().display(), addr);
    println!("Tile URL: {}", map.server().url_template());
    println!("Press Ctrl-C to stop.");

    let result = tokio::signal::ctrl_c().await;
    info!("Shutting down");
    map.shutdown().await;

    result.map_err(CliError::Signal)
}
