//! Coordinate types and constants.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Maximum latitude representable in Web Mercator (degrees).
pub const MAX_LAT: f64 = 85.051_128_78;

/// Minimum latitude representable in Web Mercator (degrees).
pub const MIN_LAT: f64 = -MAX_LAT;

/// Minimum longitude (degrees).
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude (degrees).
pub const MAX_LON: f64 = 180.0;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
///
/// Beyond 22 the per-axis tile count no longer fits the providers we talk to.
pub const MAX_ZOOM: u8 = 22;

/// Meters per degree of latitude used for radius conversions.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Errors from coordinate conversions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude was NaN or infinite.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude was NaN or infinite.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Zoom level above [`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (max {})", MAX_ZOOM)]
    InvalidZoom(u8),

    /// Radius was negative or not finite.
    #[error("Invalid radius: {0} m")]
    InvalidRadius(f64),
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a new point.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Address of a single 256×256 raster tile in the XYZ quad-tree scheme.
///
/// - `x`: column, west to east
/// - `y`: row, north to south
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub const fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Number of tiles along one axis at this tile's zoom level.
    #[inline]
    pub fn tiles_per_axis(&self) -> u64 {
        tiles_per_axis(self.zoom)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom` (`2^zoom`).
#[inline]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Inclusive tile rectangle at a single zoom level.
///
/// Always normalized: `min_x <= max_x` and `min_y <= max_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TileBounds {
    pub zoom: u8,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileBounds {
    /// Builds bounds from two opposite corners, swapping as needed.
    ///
    /// Corner labels (NW/SE) only hold away from the poles and the
    /// antimeridian, so the ordering is established here rather than assumed.
    pub fn from_corners(a: TileCoord, b: TileCoord) -> Self {
        debug_assert_eq!(a.zoom, b.zoom);
        Self {
            zoom: a.zoom,
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Number of columns covered.
    pub fn width(&self) -> u64 {
        u64::from(self.max_x - self.min_x) + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> u64 {
        u64::from(self.max_y - self.min_y) + 1
    }

    /// Total tiles inside the rectangle.
    pub fn tile_count(&self) -> u64 {
        self.width() * self.height()
    }

    /// Whether `tile` lies inside these bounds.
    pub fn contains(&self, tile: &TileCoord) -> bool {
        tile.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&tile.x)
            && (self.min_y..=self.max_y).contains(&tile.y)
    }

    /// Iterates all tiles, column-major (x outer, y inner).
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let zoom = self.zoom;
        (self.min_x..=self.max_x)
            .flat_map(move |x| (self.min_y..=self.max_y).map(move |y| TileCoord::new(zoom, x, y)))
    }
}

impl fmt::Display for TileBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "z{}: x={}-{}, y={}-{}",
            self.zoom, self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}
