//! CLI error type.

use offmap::app::AppError;
use offmap::logging::LoggingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    App(#[from] AppError),

    #[error("{0}")]
    Logging(#[from] LoggingError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to wait for Ctrl-C: {0}")]
    Signal(std::io::Error),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
