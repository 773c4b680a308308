//! The offline map facade.
//!
//! `OfflineMap` wires the tile store, remote provider, fetcher, local server,
//! mode selector, connectivity probe and asset cache together and is the only
//! type a map viewer needs to talk to.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::assets::{AssetCache, MapAssets};
use crate::cache::{CacheStats, TileStore};
use crate::connectivity::{ConnectivityProbe, HttpProbe, StaticProbe};
use crate::coord::GeoPoint;
use crate::mode::{ModeSelector, TileSource};
use crate::prefetch::{
    DownloadJob, FetchCallbacks, FetcherConfig, JobHandle, PrefetchRequest, TileFetcher,
};
use crate::provider::{ArcGisProvider, AsyncReqwestClient, TileProvider};
use crate::server::LocalTileServer;

/// Offline-capable map tile subsystem.
///
/// # Example
///
/// ```ignore
/// use offmap::app::{AppConfig, OfflineMap};
/// use offmap::prefetch::FetchCallbacks;
///
/// let map = OfflineMap::start(AppConfig::new(cache_dir)).await?;
///
/// let source = map.tile_source(37.951, 32.500).await?;
/// let job = map
///     .prefetch_region(37.951, 32.500, 800.0, FetchCallbacks::new())
///     .await?;
/// let summary = job.join().await?;
///
/// map.shutdown().await;
/// ```
pub struct OfflineMap {
    config: AppConfig,
    store: TileStore,
    fetcher: TileFetcher,
    server: Arc<LocalTileServer>,
    selector: ModeSelector,
    probe: Arc<dyn ConnectivityProbe>,
    assets: AssetCache,
}

impl OfflineMap {
    /// Builds every component from `config`.
    ///
    /// The probe is an [`HttpProbe`] unless `force_offline` is set. Nothing is
    /// bound or downloaded yet.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        let probe: Arc<dyn ConnectivityProbe> = if config.force_offline {
            Arc::new(StaticProbe(false))
        } else {
            Arc::new(HttpProbe::with_timeout(
                config.probe_url.clone(),
                config.probe_timeout,
            )?)
        };
        Self::start_with_probe(config, probe).await
    }

    /// Like [`start`](Self::start) with a caller-supplied connectivity probe.
    pub async fn start_with_probe(
        config: AppConfig,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self, AppError> {
        let tiles_dir = config.tiles_dir();
        let store = tokio::task::spawn_blocking(move || TileStore::open(tiles_dir))
            .await
            .map_err(|e| {
                AppError::Io(crate::cache::StoreError::Io {
                    path: config.tiles_dir(),
                    source: std::io::Error::other(e.to_string()),
                })
            })??;

        let client = Arc::new(AsyncReqwestClient::with_timeout(config.fetch_timeout)?);
        let provider: Arc<dyn TileProvider> = Arc::new(ArcGisProvider::with_base_url(
            client.clone(),
            config.remote_base_url.clone(),
        ));

        let fetcher = TileFetcher::with_config(
            store.clone(),
            provider.clone(),
            FetcherConfig {
                concurrency: config.concurrency,
            },
        );

        let server = Arc::new(LocalTileServer::new(store.clone(), config.port));

        let selector = ModeSelector::new(
            store.clone(),
            server.clone(),
            probe.clone(),
            provider.url_template(),
            config.zoom_levels.clone(),
        )
        .with_reference_zoom(config.reference_zoom)
        .with_center_strategy(config.center_strategy)
        .with_fallback_center(config.default_center);

        let assets = AssetCache::new(config.assets_dir(), client);

        info!(
            cache_dir = %config.cache_dir.display(),
            port = config.port,
            zoom_levels = ?config.zoom_levels,
            "Offline map ready"
        );

        Ok(Self {
            config,
            store,
            fetcher,
            server,
            selector,
            probe,
            assets,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn server(&self) -> &LocalTileServer {
        &self.server
    }

    /// Where the map should load tiles from and what to center on.
    ///
    /// Re-evaluated on every call; call again after a prefetch completes.
    pub async fn tile_source(&self, lat: f64, lon: f64) -> Result<TileSource, AppError> {
        Ok(self.selector.select(GeoPoint::new(lat, lon)).await?)
    }

    /// Starts downloading every tile within `radius_m` of the point.
    ///
    /// Returns as soon as the job is running. Refuses with
    /// [`AppError::Offline`] when the internet is unreachable, unless
    /// `require_online_for_prefetch` is off.
    pub async fn prefetch_region(
        &self,
        lat: f64,
        lon: f64,
        radius_m: f64,
        callbacks: FetchCallbacks,
    ) -> Result<JobHandle, AppError> {
        let request = PrefetchRequest::new(
            GeoPoint::new(lat, lon),
            radius_m,
            self.config.zoom_levels.clone(),
        );
        let job = DownloadJob::new(&request)?;

        if self.config.require_online_for_prefetch && !self.probe.is_reachable().await {
            return Err(AppError::Offline);
        }

        Ok(self.fetcher.spawn_job(job, callbacks))
    }

    /// Whether any configured zoom level has at least one cached tile.
    pub async fn has_cached_tiles(&self) -> bool {
        let store = self.store.clone();
        let zoom_levels = self.config.zoom_levels.clone();
        tokio::task::spawn_blocking(move || store.has_any_tile(&zoom_levels))
            .await
            .unwrap_or(false)
    }

    /// Map library files, cached locally when possible.
    pub async fn map_assets(&self) -> MapAssets {
        self.assets.resolve(self.probe.as_ref()).await
    }

    /// Tile count and size of the cache.
    pub async fn cache_stats(&self) -> Result<CacheStats, AppError> {
        let store = self.store.clone();
        let stats = tokio::task::spawn_blocking(move || store.stats())
            .await
            .map_err(|e| {
                AppError::Io(crate::cache::StoreError::Io {
                    path: self.store.root().to_path_buf(),
                    source: std::io::Error::other(e.to_string()),
                })
            })??;
        Ok(stats)
    }

    /// Starts the local tile server explicitly.
    pub async fn serve(&self) -> Result<SocketAddr, AppError> {
        Ok(self.server.start().await?)
    }

    /// Stops the local tile server if it is running.
    pub async fn shutdown(&self) {
        self.server.stop().await;
    }
}
