//! Multi-zoom tile coverage for a circular area.

use std::collections::BTreeMap;

use super::{bounding_tiles, CoordError, GeoPoint, TileBounds, TileCoord};

/// The tiles covering a circle around a point, at several zoom levels.
///
/// Derived on demand from `(center, radius, zooms)`; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRegion {
    center: GeoPoint,
    radius_m: f64,
    bounds: BTreeMap<u8, TileBounds>,
}

impl TileRegion {
    /// Computes the bounding rectangle at every requested zoom level.
    ///
    /// Duplicate zoom levels collapse; iteration is always zoom-ascending.
    pub fn covering(
        center: GeoPoint,
        radius_m: f64,
        zoom_levels: &[u8],
    ) -> Result<Self, CoordError> {
        let mut bounds = BTreeMap::new();
        for &zoom in zoom_levels {
            bounds.insert(zoom, bounding_tiles(center, radius_m, zoom)?);
        }
        Ok(Self {
            center,
            radius_m,
            bounds,
        })
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Zoom levels in ascending order.
    pub fn zoom_levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.bounds.keys().copied()
    }

    /// Bounds at one zoom level, if it is part of the region.
    pub fn bounds(&self, zoom: u8) -> Option<&TileBounds> {
        self.bounds.get(&zoom)
    }

    /// Per-zoom bounds in ascending zoom order.
    pub fn all_bounds(&self) -> impl Iterator<Item = &TileBounds> {
        self.bounds.values()
    }

    /// Total number of tiles across all zoom levels.
    pub fn len(&self) -> usize {
        self.bounds.values().map(|b| b.tile_count() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Every tile in the region: zoom ascending, then x, then y.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.bounds.values().flat_map(|b| b.tiles())
    }
}
