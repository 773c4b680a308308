//! `assets` - cache the web-map library files.

use offmap::assets::MapAssets;

use crate::commands::common::GlobalArgs;
use crate::error::CliError;

pub async fn run(global: &GlobalArgs) -> Result<(), CliError> {
    let map = global.open().await?;

    match map.map_assets().await {
        MapAssets::Local { js, css } => {
            println!(
                "Leaflet cached at {} ({} bytes JS, {} bytes CSS)",
                map.config().assets_dir().display(),
                js.len(),
                css.len()
            );
        }
        MapAssets::Remote { js_url, css_url } => {
            println!("Leaflet not cached; viewers will load it from:");
            println!("  {}", js_url);
            println!("  {}", css_url);
        }
    }
    Ok(())
}
