//! On-disk tile cache.
//!
//! The [`TileStore`] owns every tile file and the `{zoom}/{x}/{y}.png` path
//! convention. The prefetcher writes through it and the local tile server
//! reads through it; neither builds paths on its own.

mod disk;
mod types;

pub use disk::{TileStore, TILE_EXTENSION};
pub use types::{format_size, CacheStats, StoreError};
