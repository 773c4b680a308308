//! Remote tile providers.
//!
//! The fetcher only sees [`TileProvider`]; HTTP is behind [`AsyncHttpClient`]
//! so tests can swap in a mock.

mod arcgis;
mod http;
mod types;

pub use arcgis::{ArcGisProvider, ARCGIS_BASE_URL};
pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_TIMEOUT};
pub use types::{BoxFuture, ProviderError, TileProvider};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
