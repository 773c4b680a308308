//! offmap - Offline-capable map tile cache and delivery
//!
//! Keeps a local copy of Web Mercator raster tiles for the areas a user cares
//! about and hands a map viewer either the live remote tile service or a
//! local HTTP server over the cache, depending on connectivity.
//!
//! Start at [`app::OfflineMap`].

pub mod app;
pub mod assets;
pub mod cache;
pub mod connectivity;
pub mod coord;
pub mod logging;
pub mod mode;
pub mod prefetch;
pub mod provider;
pub mod server;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
