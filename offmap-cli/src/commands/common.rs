//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use clap::Args;
use offmap::app::{AppConfig, OfflineMap};

use crate::error::CliError;

/// Options accepted by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Cache directory (defaults to the platform cache dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Local tile server port
    #[arg(long, global = true, default_value_t = offmap::server::DEFAULT_PORT)]
    pub port: u16,

    /// Never touch the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Resolves the cache directory: CLI flag, then platform default.
    pub fn cache_dir(&self) -> Result<PathBuf, CliError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_cache_dir(),
        }
    }

    pub fn app_config(&self) -> Result<AppConfig, CliError> {
        Ok(AppConfig::new(self.cache_dir()?)
            .with_port(self.port)
            .with_force_offline(self.offline))
    }

    pub async fn open(&self) -> Result<OfflineMap, CliError> {
        Ok(OfflineMap::start(self.app_config()?).await?)
    }
}

/// `<platform cache dir>/offmap`.
pub fn default_cache_dir() -> Result<PathBuf, CliError> {
    AppConfig::default_cache_dir().ok_or_else(|| {
        CliError::Config("Could not determine a cache directory; pass --cache-dir".to_string())
    })
}
