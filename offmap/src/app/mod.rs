//! Collaborator-facing API.
//!
//! A map viewer creates one [`OfflineMap`] from an [`AppConfig`] and asks it
//! which tile source to use, to prefetch regions and for the map library
//! files. There are no process-wide singletons; every piece of state is owned
//! by the `OfflineMap` value.
//!
//! ```text
//! OfflineMap
//!  ├── TileStore ◄──────────── TileFetcher ──► ArcGisProvider ──► HTTP
//!  │      ▲
//!  │      └──── LocalTileServer (axum)
//!  ├── ModeSelector ──► ConnectivityProbe
//!  └── AssetCache
//! ```

mod config;
mod error;
mod map;

pub use config::{
    AppConfig, ASSETS_SUBDIR, DEFAULT_CENTER, DEFAULT_RADIUS_M, DEFAULT_ZOOM_LEVELS, TILES_SUBDIR,
};
pub use error::AppError;
pub use map::OfflineMap;
