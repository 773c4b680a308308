//! offmap CLI - prefetch map tiles for offline use and serve them locally.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use offmap::logging::{self, LoggingConfig};
use tracing::debug;

use commands::cache::CacheAction;
use commands::common::GlobalArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "offmap", version, about = "Offline map tile cache")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the tile source a map centered on a point would use
    Source {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Download every tile around a point for offline use
    Prefetch {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Radius in meters
        #[arg(long)]
        radius: Option<f64>,
    },

    /// Serve cached tiles over HTTP until Ctrl-C
    Serve,

    /// Cache the web-map library files
    Assets,

    /// Inspect the tile cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;

    let filter = if global.verbose {
        "offmap=debug,offmap_cli=debug"
    } else {
        logging::DEFAULT_FILTER
    };
    let logging_config = LoggingConfig::default()
        .with_filter(filter)
        .with_log_dir(global.cache_dir()?.join("logs"));
    let _guard = logging::init(logging_config)?;
    debug!(version = offmap::VERSION, "offmap starting");

    match cli.command {
        Commands::Source { lat, lon, json } => commands::source::run(&global, lat, lon, json).await,
        Commands::Prefetch { lat, lon, radius } => {
            commands::prefetch::run(&global, lat, lon, radius).await
        }
        Commands::Serve => commands::serve::run(&global).await,
        Commands::Assets => commands::assets::run(&global).await,
        Commands::Cache { action } => commands::cache::run(&global, action).await,
    }
}
