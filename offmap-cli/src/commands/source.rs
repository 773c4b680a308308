//! `source` - show which tile source a map centered on a point would use.

use crate::commands::common::GlobalArgs;
use crate::error::CliError;

pub async fn run(global: &GlobalArgs, lat: f64, lon: f64, json: bool) -> Result<(), CliError> {
    let map = global.open().await?;
    let source = map.tile_source(lat, lon).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&source)?);
    } else {
        println!("Mode:     {}", source.mode);
        println!("Tiles:    {}", source.url_template);
        println!("Center:   {}", source.center);
    }

    map.shutdown().await;
    Ok(())
}
