//! Provider traits and error types.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::coord::TileCoord;

/// Boxed future used by the dyn-compatible async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from talking to a remote tile endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport failure: DNS, connection refused, reset, body read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

impl ProviderError {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A remote source of raster tiles.
///
/// Implementations are shared across concurrent fetch tasks, so they must be
/// `Send + Sync` and object-safe.
pub trait TileProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// URL a single tile is requested from.
    fn tile_url(&self, tile: &TileCoord) -> String;

    /// Map-viewer URL template with `{z}`, `{x}` and `{y}` placeholders.
    fn url_template(&self) -> String;

    /// Downloads the raw image bytes for a tile.
    fn fetch<'a>(&'a self, tile: &'a TileCoord) -> BoxFuture<'a, Result<Vec<u8>, ProviderError>>;
}
