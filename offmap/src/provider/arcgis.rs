//! ArcGIS World Imagery provider.
//!
//! Esri's World Imagery basemap: global satellite and aerial imagery, no
//! authentication required for the public tier.
//!
//! # URL Pattern
//!
//! `https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}`
//!
//! Note the row comes before the column, the reverse of the local
//! `{z}/{x}/{y}` layout.
//!
//! # Terms of Use
//!
//! The World Imagery basemap is provided by Esri and is subject to their
//! terms of use. See: <https://www.esri.com/en-us/legal/terms/full-master-agreement>

use std::sync::Arc;

use crate::coord::TileCoord;

use super::http::AsyncHttpClient;
use super::types::{BoxFuture, ProviderError, TileProvider};

/// Base URL of the World Imagery map service.
pub const ARCGIS_BASE_URL: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer";

/// ArcGIS World Imagery satellite provider.
///
/// The base URL is configurable so the same provider can talk to a mirror or
/// to a test server.
#[derive(Clone)]
pub struct ArcGisProvider {
    http_client: Arc<dyn AsyncHttpClient>,
    base_url: String,
}

impl ArcGisProvider {
    /// Creates a provider against the public World Imagery service.
    pub fn new(http_client: Arc<dyn AsyncHttpClient>) -> Self {
        Self::with_base_url(http_client, ARCGIS_BASE_URL)
    }

    /// Creates a provider against an alternative map service root.
    pub fn with_base_url(http_client: Arc<dyn AsyncHttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for ArcGisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcGisProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TileProvider for ArcGisProvider {
    fn name(&self) -> &str {
        "ArcGIS"
    }

    fn tile_url(&self, tile: &TileCoord) -> String {
        format!("{}/tile/{}/{}/{}", self.base_url, tile.zoom, tile.y, tile.x)
    }

    fn url_template(&self) -> String {
        format!("{}/tile/{{z}}/{{y}}/{{x}}", self.base_url)
    }

    fn fetch<'a>(&'a self, tile: &'a TileCoord) -> BoxFuture<'a, Result<Vec<u8>, ProviderError>> {
        Box::pin(async move {
            let url = self.tile_url(tile);
            self.http_client.get(&url).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockAsyncHttpClient;

    fn provider() -> ArcGisProvider {
        ArcGisProvider::new(Arc::new(MockAsyncHttpClient::ok(b"tile")))
    }

    #[test]
    fn test_tile_url_puts_row_before_column() {
        let url = provider().tile_url(&TileCoord::new(16, 38684, 25290));
        assert_eq!(
            url,
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/16/25290/38684"
        );
    }

    #[test]
    fn test_url_template() {
        assert_eq!(
            provider().url_template(),
            "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
        );
    }

    #[test]
    fn test_custom_base_url_trailing_slash() {
        let provider = ArcGisProvider::with_base_url(
            Arc::new(MockAsyncHttpClient::ok(b"")),
            "http://127.0.0.1:9000/",
        );
        assert_eq!(
            provider.tile_url(&TileCoord::new(1, 0, 1)),
            "http://127.0.0.1:9000/tile/1/1/0"
        );
    }

    #[tokio::test]
    async fn test_fetch_requests_tile_url() {
        let client = Arc::new(MockAsyncHttpClient::ok(b"image"));
        let provider = ArcGisProvider::with_base_url(client.clone(), "http://tiles.test");

        let bytes = provider.fetch(&TileCoord::new(3, 4, 5)).await.unwrap();

        assert_eq!(bytes, b"image");
        assert_eq!(client.requested(), vec!["http://tiles.test/tile/3/5/4".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_propagates_status_error() {
        let client = Arc::new(MockAsyncHttpClient::new(Err(ProviderError::Status {
            status: 404,
            url: "x".into(),
        })));
        let provider = ArcGisProvider::new(client);

        let err = provider.fetch(&TileCoord::new(3, 4, 5)).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
