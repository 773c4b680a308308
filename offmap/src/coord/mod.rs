//! Coordinate conversion module
//!
//! Provides conversions between geographic coordinates (latitude/longitude)
//! and Web Mercator tile coordinates, plus the tile rectangles covering a
//! circular area around a point.
//!
//! # Known limitations
//!
//! Regions are not wrapped across the antimeridian: a radius that reaches past
//! ±180° is clamped to the edge column. Near the poles the longitude offset
//! grows without bound (it is scaled by `1 / cos(lat)`) and is clamped the same
//! way. Latitudes beyond the Web Mercator limit map to the edge rows.

mod region;
mod types;

pub use region::TileRegion;
pub use types::{
    tiles_per_axis, CoordError, GeoPoint, TileBounds, TileCoord, MAX_LAT, MAX_LON, MAX_ZOOM,
    METERS_PER_DEGREE, MIN_LAT, MIN_LON, MIN_ZOOM,
};

use std::f64::consts::PI;

/// Converts geographic coordinates to tile coordinates.
///
/// Latitude is clamped to the Web Mercator domain and longitude to
/// `[-180, 180]`; the resulting column/row are clamped to `[0, 2^zoom - 1]`,
/// so `lon = 180` and the poles land on edge tiles instead of overflowing.
///
/// # Errors
///
/// Non-finite coordinates and zoom levels above [`MAX_ZOOM`].
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !lat.is_finite() {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !lon.is_finite() {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let lon = lon.clamp(MIN_LON, MAX_LON);

    let n = tiles_per_axis(zoom) as f64;
    let max_index = n - 1.0;

    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);

    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, max_index);

    Ok(TileCoord::new(zoom, x as u32, y as u32))
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    fractional_tile_to_lat_lon(tile.zoom, f64::from(tile.x), f64::from(tile.y))
}

/// Inverse projection for a fractional tile position.
///
/// `(x + 0.5, y + 0.5)` gives the center of a tile rather than its corner.
pub fn fractional_tile_to_lat_lon(zoom: u8, x: f64, y: f64) -> (f64, f64) {
    let n = tiles_per_axis(zoom) as f64;

    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();

    (lat, lon)
}

/// Computes the tile rectangle covering a circle of `radius_m` meters.
///
/// The radius becomes a latitude offset of `radius / 111320` degrees and a
/// longitude offset scaled by `cos(latitude)`. The north-west and south-east
/// corners are mapped to tiles and the result is normalized so that
/// `min <= max` on both axes.
pub fn bounding_tiles(center: GeoPoint, radius_m: f64, zoom: u8) -> Result<TileBounds, CoordError> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(CoordError::InvalidRadius(radius_m));
    }
    if !center.lat.is_finite() {
        return Err(CoordError::InvalidLatitude(center.lat));
    }

    let lat_offset = radius_m / METERS_PER_DEGREE;
    let lon_offset = radius_m / (METERS_PER_DEGREE * center.lat.to_radians().cos().abs());

    let north = center.lat + lat_offset;
    let south = center.lat - lat_offset;
    let east = center.lon + lon_offset;
    let west = center.lon - lon_offset;

    let nw = to_tile_coords(north, west, zoom)?;
    let se = to_tile_coords(south, east, zoom)?;

    Ok(TileBounds::from_corners(nw, se))
}
