//! Local tile server.
//!
//! Serves the [`TileStore`] over HTTP at `/{z}/{x}/{y}.png` so a map viewer
//! can use the cache exactly like a remote tile service.
//!
//! The listener is bound inside [`LocalTileServer::start`], so the server is
//! accepting connections by the time `start` returns.
//!
//! The advertised host is `localhost`, which may resolve to either loopback
//! family. The server always binds `127.0.0.1` and also binds `[::1]` on the
//! same port when the host has IPv6 loopback.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{StoreError, TileStore, TILE_EXTENSION};
use crate::coord::TileCoord;

/// Default local server port.
pub const DEFAULT_PORT: u16 = 8000;

/// How long `stop` waits for in-flight requests before aborting the task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Errors from the local server lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind local tile server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// HTTP server rooted at a tile store.
///
/// At most one listener is running per instance; `start` and `stop` are both
/// idempotent.
pub struct LocalTileServer {
    store: TileStore,
    port: u16,
    bound_port: AtomicU16,
    running: Mutex<Option<RunningServer>>,
}

impl LocalTileServer {
    /// Creates a stopped server. Port 0 picks an ephemeral port on start.
    pub fn new(store: TileStore, port: u16) -> Self {
        Self {
            store,
            port,
            bound_port: AtomicU16::new(0),
            running: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Binds and starts serving, or returns the address already in use.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            return Ok(server.addr);
        }

        let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = tokio::net::TcpListener::bind(requested)
            .await
            .map_err(|source| ServerError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: requested,
            source,
        })?;

        let v6_addr = SocketAddr::from((Ipv6Addr::LOCALHOST, addr.port()));
        let v6_listener = match tokio::net::TcpListener::bind(v6_addr).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                debug!(addr = %v6_addr, error = %e, "IPv6 loopback not bound");
                None
            }
        };

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let app = router(self.store.clone());

        let task = tokio::spawn(async move {
            match v6_listener {
                Some(v6) => {
                    tokio::join!(
                        serve_on(listener, app.clone(), token.clone()),
                        serve_on(v6, app, token)
                    );
                }
                None => serve_on(listener, app, token).await,
            }
        });

        self.bound_port.store(addr.port(), Ordering::SeqCst);
        info!(%addr, root = %self.store.root().display(), "Local tile server listening");

        *running = Some(RunningServer {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stops the server and releases its socket. No-op when not running.
    pub async fn stop(&self) {
        let Some(server) = self.running.lock().await.take() else {
            return;
        };

        server.shutdown.cancel();
        let mut task = server.task;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            warn!(addr = %server.addr, "Local tile server did not drain in time, aborting");
            task.abort();
            let _ = task.await;
        }

        self.bound_port.store(0, Ordering::SeqCst);
        info!(addr = %server.addr, "Local tile server stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Address of the running listener.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|s| s.addr)
    }

    /// Port tiles are (or will be) served on.
    pub fn port(&self) -> u16 {
        match self.bound_port.load(Ordering::SeqCst) {
            0 => self.port,
            bound => bound,
        }
    }

    /// Map-viewer URL template for this server.
    pub fn url_template(&self) -> String {
        format!(
            "http://localhost:{}/{{z}}/{{x}}/{{y}}.{}",
            self.port(),
            TILE_EXTENSION
        )
    }
}

impl std::fmt::Debug for LocalTileServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTileServer")
            .field("root", &self.store.root())
            .field("port", &self.port())
            .finish_non_exhaustive()
    }
}

fn serve_on(
    listener: tokio::net::TcpListener,
    app: Router,
    token: CancellationToken,
) -> impl Future<Output = ()> {
    async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Local tile server exited with error");
        }
    }
}

fn router(store: TileStore) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/:z/:x/:file", get(get_tile))
        .with_state(store)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn get_tile(
    State(store): State<TileStore>,
    AxumPath((z, x, file)): AxumPath<(String, String, String)>,
) -> Response {
    let Some(tile) = parse_tile_path(&z, &x, &file) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    match store.get(tile).await {
        Ok(data) => {
            let content_type = HeaderValue::from_static(sniff_content_type(&data));
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], Body::from(data))
                .into_response()
        }
        Err(StoreError::NotFound(_)) => {
            debug!(tile = %tile, "Tile not cached");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => {
            warn!(tile = %tile, error = %e, "Tile read failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response()
        }
    }
}

/// Parses `{z}/{x}/{y}.png` path segments.
fn parse_tile_path(z: &str, x: &str, file: &str) -> Option<TileCoord> {
    let y = file.strip_suffix(TILE_EXTENSION)?.strip_suffix('.')?;
    Some(TileCoord::new(z.parse().ok()?, x.parse().ok()?, y.parse().ok()?))
}

/// Picks a content type from the image magic bytes.
fn sniff_content_type(data: &[u8]) -> &'static str {
    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

    if data.starts_with(PNG_MAGIC) {
        "image/png"
    } else if data.starts_with(JPEG_MAGIC) {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nrest-of-image";

    fn server() -> (TempDir, LocalTileServer) {
        let temp = TempDir::new().unwrap();
        let store = TileStore::open(temp.path()).unwrap();
        (temp, LocalTileServer::new(store, 0))
    }

    #[test]
    fn test_parse_tile_path() {
        assert_eq!(parse_tile_path("16", "38684", "25290.png"), Some(TileCoord::new(16, 38684, 25290)));
        assert_eq!(parse_tile_path("16", "1", "2.jpg"), None);
        assert_eq!(parse_tile_path("16", "1", "2png"), None);
        assert_eq!(parse_tile_path("a", "1", "2.png"), None);
        assert_eq!(parse_tile_path("300", "1", "2.png"), None);
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(PNG_BYTES), "image/png");
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a"), "application/octet-stream");
        assert_eq!(sniff_content_type(b""), "application/octet-stream");
    }

    #[test]
    fn test_url_template_uses_configured_port_before_start() {
        let temp = TempDir::new().unwrap();
        let server = LocalTileServer::new(TileStore::open(temp.path()).unwrap(), DEFAULT_PORT);
        assert_eq!(server.url_template(), "http://localhost:8000/{z}/{x}/{y}.png");
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (_temp, server) = server();

        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.port(), 0);
        assert_eq!(
            server.url_template(),
            format!("http://localhost:{}/{{z}}/{{x}}/{{y}}.png", first.port())
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_serves_stored_tile() {
        let (_temp, server) = server();
        server.store().write(&TileCoord::new(16, 38684, 25290), PNG_BYTES).unwrap();
        let addr = server.start().await.unwrap();

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/16/38684/25290.png", addr))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()[reqwest::header::CONTENT_TYPE], "image/png");
        assert_eq!(response.bytes().await.unwrap().as_ref(), PNG_BYTES);

        drop(client);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_missing_and_malformed_are_404() {
        let (_temp, server) = server();
        let addr = server.start().await.unwrap();
        let client = reqwest::Client::new();

        for path in ["16/1/2.png", "16/1/2.jpg", "a/b/c.png", "16/1", "16/1/2/3.png"] {
            let status = client
                .get(format!("http://{}/{}", addr, path))
                .send()
                .await
                .unwrap()
                .status();
            assert_eq!(status, reqwest::StatusCode::NOT_FOUND, "path {path}");
        }

        drop(client);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_healthz() {
        let (_temp, server) = server();
        let addr = server.start().await.unwrap();

        let body = reqwest::get(format!("http://{}/healthz", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");

        server.stop().await;
    }

    #[tokio::test]
    async fn test_serves_both_loopback_families() {
        if std::net::TcpListener::bind((Ipv6Addr::LOCALHOST, 0)).is_err() {
            return;
        }
        let (_temp, server) = server();
        server.store().write(&TileCoord::new(16, 38684, 25290), PNG_BYTES).unwrap();
        let port = server.start().await.unwrap().port();
        let client = reqwest::Client::new();

        for host in ["127.0.0.1", "[::1]", "localhost"] {
            let response = client
                .get(format!("http://{host}:{port}/16/38684/25290.png"))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::OK, "host {host}");
        }

        drop(client);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_releases_port() {
        let (_temp, server) = server();
        let addr = server.start().await.unwrap();

        server.stop().await;
        assert!(!server.is_running().await);
        assert!(server.local_addr().await.is_none());

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port should be free after stop");

        // Second stop is a no-op.
        server.stop().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (_temp, server) = server();
        server.start().await.unwrap();
        server.stop().await;

        assert!(server.start().await.is_ok());
        assert!(server.is_running().await);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let occupied = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = occupied.local_addr().unwrap().port();

        let temp = TempDir::new().unwrap();
        let server = LocalTileServer::new(TileStore::open(temp.path()).unwrap(), port);

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(!server.is_running().await);
    }
}
