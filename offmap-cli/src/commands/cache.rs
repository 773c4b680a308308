//! Cache management CLI commands.

use clap::Subcommand;

use crate::commands::common::GlobalArgs;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show tile cache statistics
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Run a cache subcommand.
pub async fn run(global: &GlobalArgs, action: CacheAction) -> Result<(), CliError> {
    let map = global.open().await?;

    match action {
        CacheAction::Stats { json } => {
            let stats = map.cache_stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!("Tile cache: {}", map.store().root().display());
            println!("  Tiles: {}", stats.tiles);
            println!("  Size:  {}", offmap::cache::format_size(stats.bytes));

            let zooms = map.store().zoom_levels();
            if !zooms.is_empty() {
                println!("  Zooms: {:?}", zooms);
            }
            Ok(())
        }
    }
}
