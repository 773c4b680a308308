//! Local cache of the web-map library (Leaflet JS and CSS).
//!
//! A viewer running offline cannot reach the CDN, so the library files are
//! kept next to the tiles once they have been fetched. Resolution walks a
//! small state machine:
//!
//! ```text
//! Missing -> Downloading -> Available
//!                        \-> Unavailable
//! ```
//!
//! After a download the local read is retried once. If the files still cannot
//! be read, or the network is down, the CDN URLs are returned instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityProbe;
use crate::provider::{AsyncHttpClient, ProviderError};

macro_rules! leaflet_version {
    () => {
        "1.9.4"
    };
}

/// Leaflet release the assets are pinned to.
pub const LEAFLET_VERSION: &str = leaflet_version!();

/// CDN directory holding the Leaflet distribution files.
pub const LEAFLET_CDN_BASE: &str = concat!("https://unpkg.com/leaflet@", leaflet_version!(), "/dist");

pub const LEAFLET_JS: &str = "leaflet.js";
pub const LEAFLET_CSS: &str = "leaflet.css";

/// Monotonic suffix for temporary file names within this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where the viewer should load the map library from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum MapAssets {
    /// File contents, ready to inline.
    Local { js: String, css: String },
    /// CDN URLs.
    Remote { js_url: String, css_url: String },
}

impl MapAssets {
    pub fn is_local(&self) -> bool {
        matches!(self, MapAssets::Local { .. })
    }
}

/// Where the last resolution ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Missing,
    Downloading,
    Available,
    Unavailable,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetState::Missing => "missing",
            AssetState::Downloading => "downloading",
            AssetState::Available => "available",
            AssetState::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Leaflet files cached under a directory.
pub struct AssetCache {
    dir: PathBuf,
    cdn_base: String,
    client: Arc<dyn AsyncHttpClient>,
    state: Mutex<AssetState>,
    download_lock: tokio::sync::Mutex<()>,
}

impl AssetCache {
    pub fn new(dir: impl Into<PathBuf>, client: Arc<dyn AsyncHttpClient>) -> Self {
        Self::with_cdn_base(dir, client, LEAFLET_CDN_BASE)
    }

    pub fn with_cdn_base(
        dir: impl Into<PathBuf>,
        client: Arc<dyn AsyncHttpClient>,
        cdn_base: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            cdn_base: cdn_base.into().trim_end_matches('/').to_string(),
            client,
            state: Mutex::new(AssetState::Missing),
            download_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state(&self) -> AssetState {
        *self.state.lock()
    }

    fn set_state(&self, state: AssetState) {
        *self.state.lock() = state;
        debug!(%state, "Map asset state");
    }

    fn cdn_url(&self, file: &str) -> String {
        format!("{}/{}", self.cdn_base, file)
    }

    fn remote(&self) -> MapAssets {
        MapAssets::Remote {
            js_url: self.cdn_url(LEAFLET_JS),
            css_url: self.cdn_url(LEAFLET_CSS),
        }
    }

    /// Returns local file contents when possible, CDN URLs otherwise.
    ///
    /// Downloads missing files only when `probe` reports connectivity.
    pub async fn resolve(&self, probe: &dyn ConnectivityProbe) -> MapAssets {
        let mut downloaded = false;

        loop {
            match self.read_local().await {
                Ok((js, css)) => {
                    self.set_state(AssetState::Available);
                    return MapAssets::Local { js, css };
                }
                Err(e) if downloaded => {
                    warn!(error = %e, "Map assets unreadable after download, using CDN");
                    self.set_state(AssetState::Unavailable);
                    return self.remote();
                }
                Err(e) => debug!(error = %e, "Map assets not cached"),
            }

            self.set_state(AssetState::Missing);
            if !probe.is_reachable().await {
                info!("Offline and map assets not cached, using CDN URLs");
                self.set_state(AssetState::Unavailable);
                return self.remote();
            }

            self.set_state(AssetState::Downloading);
            if let Err(e) = self.download_missing().await {
                warn!(error = %e, "Map asset download failed, using CDN");
                self.set_state(AssetState::Unavailable);
                return self.remote();
            }
            downloaded = true;
        }
    }

    async fn read_local(&self) -> std::io::Result<(String, String)> {
        let js = tokio::fs::read_to_string(self.dir.join(LEAFLET_JS)).await?;
        let css = tokio::fs::read_to_string(self.dir.join(LEAFLET_CSS)).await?;
        Ok((js, css))
    }

    /// Fetches whichever library files are not on disk yet.
    ///
    /// One download at a time; a caller that waited finds the files present.
    async fn download_missing(&self) -> Result<(), AssetError> {
        let _guard = self.download_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| AssetError::Io {
                path: self.dir.clone(),
                source,
            })?;

        for file in [LEAFLET_JS, LEAFLET_CSS] {
            let path = self.dir.join(file);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }

            let url = self.cdn_url(file);
            let data = self.client.get(&url).await?;
            write_atomic(&path, &data)
                .await
                .map_err(|source| AssetError::Io { path, source })?;
            info!(%url, bytes = data.len(), "Map asset cached");
        }
        Ok(())
    }
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("dir", &self.dir)
            .field("cdn_base", &self.cdn_base)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
enum AssetError {
    #[error(transparent)]
    Download(#[from] ProviderError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        name,
        std::process::id(),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
