//! Internet reachability check.
//!
//! A single bounded HTTP request decides whether remote tiles and CDN assets
//! are worth trying. Only a successful response counts as online; timeouts,
//! DNS failures and error statuses all mean offline.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::provider::{AsyncHttpClient, AsyncReqwestClient, BoxFuture, ProviderError};

/// Default URL probed for connectivity.
pub const DEFAULT_PROBE_URL: &str = "http://www.google.com";

/// Default probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Answers "is the internet reachable right now?".
pub trait ConnectivityProbe: Send + Sync {
    /// Never fails; any error is reported as `false`.
    fn is_reachable(&self) -> BoxFuture<'_, bool>;
}

/// Probe that issues one GET against a well-known URL.
pub struct HttpProbe {
    client: Arc<dyn AsyncHttpClient>,
    url: String,
}

impl HttpProbe {
    /// Probe against [`DEFAULT_PROBE_URL`] with a [`DEFAULT_PROBE_TIMEOUT`] budget.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_PROBE_URL, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = AsyncReqwestClient::with_timeout(timeout)?;
        Ok(Self::with_client(Arc::new(client), url))
    }

    /// Probe using an existing client; the client's timeout applies.
    pub fn with_client(client: Arc<dyn AsyncHttpClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ConnectivityProbe for HttpProbe {
    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.client.get(&self.url).await {
                Ok(_) => true,
                Err(e) => {
                    debug!(url = %self.url, error = %e, "Connectivity probe failed");
                    false
                }
            }
        })
    }
}

/// Probe with a fixed answer, for forced offline mode and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

impl ConnectivityProbe for StaticProbe {
    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        let reachable = self.0;
        Box::pin(async move { reachable })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockAsyncHttpClient;

    #[tokio::test]
    async fn test_success_is_reachable() {
        let probe = HttpProbe::with_client(Arc::new(MockAsyncHttpClient::ok(b"<html>")), "http://probe");
        assert!(probe.is_reachable().await);
    }

    #[tokio::test]
    async fn test_error_status_is_unreachable() {
        let client = MockAsyncHttpClient::new(Err(ProviderError::Status {
            status: 503,
            url: "http://probe".into(),
        }));
        let probe = HttpProbe::with_client(Arc::new(client), "http://probe");
        assert!(!probe.is_reachable().await);
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let client = MockAsyncHttpClient::new(Err(ProviderError::Timeout("http://probe".into())));
        let probe = HttpProbe::with_client(Arc::new(client), "http://probe");
        assert!(!probe.is_reachable().await);
    }

    #[tokio::test]
    async fn test_unroutable_address_is_unreachable() {
        // Nothing listens on port 9 of the loopback interface.
        let probe =
            HttpProbe::with_timeout("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        assert!(!probe.is_reachable().await);
    }

    #[tokio::test]
    async fn test_static_probe() {
        assert!(StaticProbe(true).is_reachable().await);
        assert!(!StaticProbe(false).is_reachable().await);
    }
}
