//! Tile source selection.
//!
//! Decides on every call whether the map should use the remote tile service
//! or the local tile server, and which point to center on:
//!
//! | Cached tiles | Online | Source | Center |
//! |---|---|---|---|
//! | any | yes | remote | caller's |
//! | yes | no | local | representative cached tile, else fallback |
//! | no | no | local, degraded | caller's |
//!
//! Nothing is cached between calls; the cache is rescanned and the probe
//! re-run each time.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::TileStore;
use crate::connectivity::ConnectivityProbe;
use crate::coord::{fractional_tile_to_lat_lon, tile_to_lat_lon, GeoPoint};
use crate::server::{LocalTileServer, ServerError};

/// Zoom level the representative center is read from.
pub const DEFAULT_REFERENCE_ZOOM: u8 = 16;

/// Which tile source the map should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Live remote tile service.
    Remote,
    /// Local tile server over a populated cache.
    Local,
    /// Local tile server over an empty cache; every tile will 404.
    Degraded,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceMode::Remote => "remote",
            SourceMode::Local => "local",
            SourceMode::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// The chosen source plus the point to center the map on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileSource {
    pub mode: SourceMode,
    pub url_template: String,
    pub center: GeoPoint,
}

/// How the representative center of the cache is picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CenterStrategy {
    /// North-west corner of an arbitrary tile at the reference zoom.
    #[default]
    AnyTile,
    /// Mean position of every tile at the finest populated zoom.
    Centroid,
}

/// What the cache looks like right now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheState {
    pub has_tiles: bool,
    pub center: Option<GeoPoint>,
}

/// Chooses between the remote service and the local server.
pub struct ModeSelector {
    store: TileStore,
    server: Arc<LocalTileServer>,
    probe: Arc<dyn ConnectivityProbe>,
    remote_template: String,
    zoom_levels: Vec<u8>,
    reference_zoom: u8,
    strategy: CenterStrategy,
    fallback_center: Option<GeoPoint>,
}

impl ModeSelector {
    pub fn new(
        store: TileStore,
        server: Arc<LocalTileServer>,
        probe: Arc<dyn ConnectivityProbe>,
        remote_template: impl Into<String>,
        zoom_levels: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            store,
            server,
            probe,
            remote_template: remote_template.into(),
            zoom_levels: zoom_levels.into(),
            reference_zoom: DEFAULT_REFERENCE_ZOOM,
            strategy: CenterStrategy::default(),
            fallback_center: None,
        }
    }

    pub fn with_reference_zoom(mut self, zoom: u8) -> Self {
        self.reference_zoom = zoom;
        self
    }

    pub fn with_center_strategy(mut self, strategy: CenterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Center used in local mode when no tile sits at the reference zoom.
    ///
    /// Without one the caller's center is kept.
    pub fn with_fallback_center(mut self, center: GeoPoint) -> Self {
        self.fallback_center = Some(center);
        self
    }

    /// Picks a source for a map centered on `center`.
    ///
    /// Starts the local server when it is chosen.
    pub async fn select(&self, center: GeoPoint) -> Result<TileSource, ServerError> {
        let state = self.cache_state().await;
        let online = self.probe.is_reachable().await;
        debug!(online, has_tiles = state.has_tiles, "Selecting tile source");

        let source = if online {
            TileSource {
                mode: SourceMode::Remote,
                url_template: self.remote_template.clone(),
                center,
            }
        } else {
            self.server.start().await?;
            let (mode, center) = if state.has_tiles {
                let resolved = state.center.or(self.fallback_center).unwrap_or(center);
                (SourceMode::Local, resolved)
            } else {
                (SourceMode::Degraded, center)
            };
            TileSource {
                mode,
                url_template: self.server.url_template(),
                center,
            }
        };

        info!(mode = %source.mode, center = %source.center, "Tile source selected");
        Ok(source)
    }

    /// Scans the cache for population and a representative center.
    ///
    /// `center` is only derived when a configured zoom level has tiles.
    pub async fn cache_state(&self) -> CacheState {
        let store = self.store.clone();
        let zoom_levels = self.zoom_levels.clone();
        let reference_zoom = self.reference_zoom;
        let strategy = self.strategy;

        tokio::task::spawn_blocking(move || {
            let has_tiles = store.has_any_tile(&zoom_levels);
            let center = if has_tiles {
                representative_center(&store, strategy, reference_zoom, &zoom_levels)
            } else {
                None
            };
            CacheState { has_tiles, center }
        })
        .await
        .unwrap_or(CacheState {
            has_tiles: false,
            center: None,
        })
    }
}

/// Center of the cached area, if the cache has anything to center on.
pub fn representative_center(
    store: &TileStore,
    strategy: CenterStrategy,
    reference_zoom: u8,
    zoom_levels: &[u8],
) -> Option<GeoPoint> {
    match strategy {
        CenterStrategy::AnyTile => store
            .find_any_tile(reference_zoom)
            .map(|tile| tile_to_lat_lon(&tile).into()),
        CenterStrategy::Centroid => {
            let mut zooms = zoom_levels.to_vec();
            zooms.sort_unstable_by(|a, b| b.cmp(a));
            zooms.into_iter().find_map(|zoom| {
                let tiles = store.tiles_at(zoom);
                if tiles.is_empty() {
                    return None;
                }
                let count = tiles.len() as f64;
                let mean_x = tiles.iter().map(|t| f64::from(t.x) + 0.5).sum::<f64>() / count;
                let mean_y = tiles.iter().map(|t| f64::from(t.y) + 0.5).sum::<f64>() / count;
                Some(fractional_tile_to_lat_lon(zoom, mean_x, mean_y).into())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticProbe;
    use crate::coord::{to_tile_coords, TileCoord};
    use tempfile::TempDir;

    const REMOTE: &str = "https://tiles.test/tile/{z}/{y}/{x}";
    const ZOOMS: [u8; 5] = [14, 15, 16, 17, 18];

    fn selector(online: bool) -> (TempDir, Arc<LocalTileServer>, ModeSelector) {
        let temp = TempDir::new().unwrap();
        let store = TileStore::open(temp.path()).unwrap();
        let server = Arc::new(LocalTileServer::new(store.clone(), 0));
        let selector = ModeSelector::new(
            store,
            server.clone(),
            Arc::new(StaticProbe(online)),
            REMOTE,
            ZOOMS,
        );
        (temp, server, selector)
    }

    fn caller() -> GeoPoint {
        GeoPoint::new(10.0, 20.0)
    }

    #[tokio::test]
    async fn test_online_with_tiles_uses_remote() {
        let (_temp, server, selector) = selector(true);
        server.store().write(&TileCoord::new(16, 1, 2), b"t").unwrap();

        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Remote);
        assert_eq!(source.url_template, REMOTE);
        assert_eq!(source.center, caller());
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_online_without_tiles_uses_remote() {
        let (_temp, _server, selector) = selector(true);
        let source = selector.select(caller()).await.unwrap();
        assert_eq!(source.mode, SourceMode::Remote);
        assert_eq!(source.center, caller());
    }

    #[tokio::test]
    async fn test_offline_with_tiles_uses_local_and_cached_center() {
        let (_temp, server, selector) = selector(false);
        let tile = TileCoord::new(16, 38684, 25290);
        server.store().write(&tile, b"t").unwrap();

        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Local);
        assert_eq!(source.center, GeoPoint::from(tile_to_lat_lon(&tile)));
        assert!(server.is_running().await);
        assert_eq!(source.url_template, server.url_template());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_offline_without_tiles_is_degraded() {
        let (_temp, server, selector) = selector(false);

        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Degraded);
        assert_eq!(source.center, caller());
        assert!(source.url_template.starts_with("http://localhost:"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_tiles_only_outside_reference_zoom_keep_caller_center() {
        let (_temp, server, selector) = selector(false);
        server.store().write(&TileCoord::new(14, 9670, 6322), b"t").unwrap();

        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Local);
        assert_eq!(source.center, caller());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_degraded_ignores_tiles_outside_configured_zooms() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::open(temp.path()).unwrap();
        store.write(&TileCoord::new(16, 38684, 25290), b"t").unwrap();
        let server = Arc::new(LocalTileServer::new(store.clone(), 0));
        let selector = ModeSelector::new(
            store,
            server.clone(),
            Arc::new(StaticProbe(false)),
            REMOTE,
            [14],
        );

        assert_eq!(
            selector.cache_state().await,
            CacheState {
                has_tiles: false,
                center: None
            }
        );
        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Degraded);
        assert_eq!(source.center, caller());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_fallback_center_when_reference_zoom_empty() {
        let (_temp, server, selector) = selector(false);
        let fallback = GeoPoint::new(37.951, 32.5);
        let selector = selector.with_fallback_center(fallback);
        server.store().write(&TileCoord::new(14, 9670, 6322), b"t").unwrap();

        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Local);
        assert_eq!(source.center, fallback);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_fallback_center_not_used_when_degraded() {
        let (_temp, server, selector) = selector(false);
        let selector = selector.with_fallback_center(GeoPoint::new(37.951, 32.5));

        let source = selector.select(caller()).await.unwrap();

        assert_eq!(source.mode, SourceMode::Degraded);
        assert_eq!(source.center, caller());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_cache_state_reflects_population() {
        let (_temp, server, selector) = selector(false);
        assert_eq!(
            selector.cache_state().await,
            CacheState {
                has_tiles: false,
                center: None
            }
        );

        server.store().write(&TileCoord::new(18, 5, 5), b"t").unwrap();
        let state = selector.cache_state().await;
        assert!(state.has_tiles);
        assert!(state.center.is_none());
    }

    #[test]
    fn test_centroid_uses_finest_zoom() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::open(temp.path()).unwrap();
        let center = to_tile_coords(37.951, 32.500, 17).unwrap();
        for dx in 0..3 {
            for dy in 0..3 {
                let tile = TileCoord::new(17, center.x + dx - 1, center.y + dy - 1);
                store.write(&tile, b"t").unwrap();
            }
        }
        store.write(&TileCoord::new(14, 0, 0), b"far away").unwrap();

        let point =
            representative_center(&store, CenterStrategy::Centroid, 16, &ZOOMS).unwrap();

        assert_eq!(to_tile_coords(point.lat, point.lon, 17).unwrap(), center);
    }

    #[test]
    fn test_source_serializes_lowercase_mode() {
        let source = TileSource {
            mode: SourceMode::Degraded,
            url_template: "http://localhost:8000/{z}/{x}/{y}.png".into(),
            center: GeoPoint::new(1.5, 2.5),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["mode"], "degraded");
        assert_eq!(json["center"]["lat"], 1.5);
    }

    #[test]
    fn test_centroid_empty_cache() {
        let temp = TempDir::new().unwrap();
        let store = TileStore::open(temp.path()).unwrap();
        assert!(representative_center(&store, CenterStrategy::Centroid, 16, &ZOOMS).is_none());
    }
}
