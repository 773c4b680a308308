//! Application configuration for [`OfflineMap`](super::OfflineMap).
//!
//! There is no configuration file; callers build an `AppConfig` from the
//! defaults below and override fields with the `with_*` methods.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connectivity::{DEFAULT_PROBE_TIMEOUT, DEFAULT_PROBE_URL};
use crate::coord::GeoPoint;
use crate::mode::{CenterStrategy, DEFAULT_REFERENCE_ZOOM};
use crate::prefetch::DEFAULT_CONCURRENCY;
use crate::provider::{ARCGIS_BASE_URL, DEFAULT_TIMEOUT};
use crate::server::DEFAULT_PORT;

/// Default prefetch radius in meters.
pub const DEFAULT_RADIUS_M: f64 = 800.0;

/// Zoom levels cached by default.
pub const DEFAULT_ZOOM_LEVELS: [u8; 5] = [14, 15, 16, 17, 18];

/// Offline map center when cached tiles exist but none at the reference zoom.
pub const DEFAULT_CENTER: GeoPoint = GeoPoint::new(37.951, 32.500);

/// Subdirectory of the cache root holding tiles.
pub const TILES_SUBDIR: &str = "tiles";

/// Subdirectory of the cache root holding the web-map library files.
pub const ASSETS_SUBDIR: &str = "assets/leaflet";

/// Configuration for the offline map subsystem.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Root directory; tiles and assets live in subdirectories.
    pub cache_dir: PathBuf,

    /// Local tile server port (0 = ephemeral).
    pub port: u16,

    /// Prefetch radius used when the caller does not give one.
    pub radius_m: f64,

    /// Zoom levels prefetched and scanned for cached tiles.
    pub zoom_levels: Vec<u8>,

    /// Zoom level the representative cache center is read from.
    pub reference_zoom: u8,

    pub center_strategy: CenterStrategy,

    /// Offline center when no tile sits at `reference_zoom`.
    pub default_center: GeoPoint,

    /// Root of the remote map service (tiles are under `{base}/tile/`).
    pub remote_base_url: String,

    /// Per-tile download timeout.
    pub fetch_timeout: Duration,

    /// Tile downloads in flight.
    pub concurrency: usize,

    pub probe_url: String,

    pub probe_timeout: Duration,

    /// Treat the internet as unreachable without probing.
    pub force_offline: bool,

    /// Refuse to start a prefetch when the probe reports no connectivity.
    pub require_online_for_prefetch: bool,
}

impl AppConfig {
    /// Creates a config rooted at `cache_dir` with every other value defaulted.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            port: DEFAULT_PORT,
            radius_m: DEFAULT_RADIUS_M,
            zoom_levels: DEFAULT_ZOOM_LEVELS.to_vec(),
            reference_zoom: DEFAULT_REFERENCE_ZOOM,
            center_strategy: CenterStrategy::default(),
            default_center: DEFAULT_CENTER,
            remote_base_url: ARCGIS_BASE_URL.to_string(),
            fetch_timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            probe_url: DEFAULT_PROBE_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            force_offline: false,
            require_online_for_prefetch: true,
        }
    }

    /// Directory the tile store is rooted at.
    pub fn tiles_dir(&self) -> PathBuf {
        self.cache_dir.join(TILES_SUBDIR)
    }

    /// Directory the map library files are cached in.
    pub fn assets_dir(&self) -> PathBuf {
        self.cache_dir.join(ASSETS_SUBDIR)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Platform cache directory for offmap (`~/.cache/offmap` on Linux).
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("offmap"))
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_m = radius_m;
        self
    }

    pub fn with_zoom_levels(mut self, zoom_levels: impl Into<Vec<u8>>) -> Self {
        self.zoom_levels = zoom_levels.into();
        self
    }

    pub fn with_reference_zoom(mut self, zoom: u8) -> Self {
        self.reference_zoom = zoom;
        self
    }

    pub fn with_center_strategy(mut self, strategy: CenterStrategy) -> Self {
        self.center_strategy = strategy;
        self
    }

    pub fn with_default_center(mut self, center: GeoPoint) -> Self {
        self.default_center = center;
        self
    }

    pub fn with_remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.remote_base_url = url.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_probe(mut self, url: impl Into<String>, timeout: Duration) -> Self {
        self.probe_url = url.into();
        self.probe_timeout = timeout;
        self
    }

    pub fn with_force_offline(mut self, offline: bool) -> Self {
        self.force_offline = offline;
        self
    }

    pub fn with_require_online_for_prefetch(mut self, require: bool) -> Self {
        self.require_online_for_prefetch = require;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::new("/tmp/offmap");

        assert_eq!(config.port, 8000);
        assert_eq!(config.radius_m, 800.0);
        assert_eq!(config.zoom_levels, vec![14, 15, 16, 17, 18]);
        assert_eq!(config.reference_zoom, 16);
        assert_eq!(config.default_center, GeoPoint::new(37.951, 32.500));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.probe_url, "http://www.google.com");
        assert_eq!(config.concurrency, 8);
        assert!(!config.force_offline);
        assert!(config.require_online_for_prefetch);
    }

    #[test]
    fn test_subdirectories() {
        let config = AppConfig::new("/var/cache/offmap");
        assert_eq!(config.tiles_dir(), PathBuf::from("/var/cache/offmap/tiles"));
        assert_eq!(
            config.assets_dir(),
            PathBuf::from("/var/cache/offmap/assets/leaflet")
        );
    }

    #[test]
    fn test_builders() {
        let config = AppConfig::new("/tmp/x")
            .with_port(0)
            .with_radius(1_500.0)
            .with_zoom_levels(vec![12, 13])
            .with_concurrency(2)
            .with_force_offline(true)
            .with_remote_base_url("http://127.0.0.1:9999");

        assert_eq!(config.port, 0);
        assert_eq!(config.radius_m, 1_500.0);
        assert_eq!(config.zoom_levels, vec![12, 13]);
        assert_eq!(config.concurrency, 2);
        assert!(config.force_offline);
        assert_eq!(config.remote_base_url, "http://127.0.0.1:9999");
    }
}
