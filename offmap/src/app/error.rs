//! Application error types.

use std::fmt;

use crate::cache::StoreError;
use crate::coord::CoordError;
use crate::prefetch::FetchError;
use crate::provider::ProviderError;
use crate::server::ServerError;

/// Errors surfaced by the [`OfflineMap`](super::OfflineMap) facade.
#[derive(Debug)]
pub enum AppError {
    /// Invalid coordinates, zoom or radius.
    Coord(CoordError),

    /// The local tile server could not be started.
    Server(ServerError),

    /// A prefetch job failed as a whole.
    Fetch(FetchError),

    /// An HTTP client could not be set up.
    Provider(ProviderError),

    /// Prefetch refused because the internet is unreachable.
    Offline,

    /// The tile cache directory could not be used.
    Io(StoreError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Coord(e) => write!(f, "Invalid region: {}", e),
            AppError::Server(e) => write!(f, "Local tile server error: {}", e),
            AppError::Fetch(e) => write!(f, "Prefetch failed: {}", e),
            AppError::Provider(e) => write!(f, "Provider error: {}", e),
            AppError::Offline => {
                write!(f, "No internet connection; tiles cannot be downloaded")
            }
            AppError::Io(e) => write!(f, "Tile cache error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Coord(e) => Some(e),
            AppError::Server(e) => Some(e),
            AppError::Fetch(e) => Some(e),
            AppError::Provider(e) => Some(e),
            AppError::Offline => None,
            AppError::Io(e) => Some(e),
        }
    }
}

impl From<CoordError> for AppError {
    fn from(e: CoordError) -> Self {
        AppError::Coord(e)
    }
}

impl From<ServerError> for AppError {
    fn from(e: ServerError) -> Self {
        AppError::Server(e)
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::Fetch(e)
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        AppError::Provider(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_app_error_display() {
        assert_eq!(
            AppError::Offline.to_string(),
            "No internet connection; tiles cannot be downloaded"
        );
        let err = AppError::from(CoordError::InvalidZoom(30));
        assert_eq!(err.to_string(), "Invalid region: Invalid zoom level: 30 (max 22)");
    }

    #[test]
    fn test_app_error_source() {
        assert!(AppError::Offline.source().is_none());
        let err = AppError::from(ProviderError::Timeout("http://x".into()));
        assert!(err.source().is_some());
    }
}
