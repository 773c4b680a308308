//! Filesystem-backed tile store.
//!
//! Tiles live at `{root}/{zoom}/{x}/{y}.png`, one file per tile. The presence
//! of the file is the only existence signal; there is no index or manifest.
//!
//! Writes go to a hidden temporary file next to the final path and are renamed
//! into place once complete, so a concurrent reader (the local tile server)
//! either sees the whole tile or nothing at all.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::types::{CacheStats, StoreError};
use crate::coord::TileCoord;

/// File extension used for stored tiles.
pub const TILE_EXTENSION: &str = "png";

/// Monotonic suffix for temporary file names within this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Persistent tile store rooted at a directory.
///
/// Cheap to clone; all clones share the same root. Concurrent writes to
/// distinct tiles are independent, and racing creation of a shared
/// `{zoom}/{x}` directory is not an error.
#[derive(Debug, Clone)]
pub struct TileStore {
    root: Arc<PathBuf>,
}

impl TileStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Constructs the path for a tile file.
    pub fn tile_path(&self, tile: &TileCoord) -> PathBuf {
        self.root
            .join(tile.zoom.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.{}", tile.y, TILE_EXTENSION))
    }

    /// Whether the tile is present on disk.
    pub fn exists(&self, tile: &TileCoord) -> bool {
        self.tile_path(tile).is_file()
    }

    /// Reads a tile's bytes.
    pub fn read(&self, tile: &TileCoord) -> Result<Vec<u8>, StoreError> {
        let path = self.tile_path(tile);
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(*tile)
            } else {
                StoreError::Io { path, source }
            }
        })
    }

    /// Writes a tile's bytes atomically (write-then-rename).
    pub fn write(&self, tile: &TileCoord, data: &[u8]) -> Result<(), StoreError> {
        let path = self.tile_path(tile);
        let parent = path.parent().unwrap_or(self.root.as_path()).to_path_buf();

        // create_dir_all treats a concurrently created directory as success
        fs::create_dir_all(&parent).map_err(|source| StoreError::Io {
            path: parent.clone(),
            source,
        })?;

        let tmp = parent.join(format!(
            ".{}.{}.{}.{}.tmp",
            tile.y,
            TILE_EXTENSION,
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = write_file(&tmp, data).and_then(|()| fs::rename(&tmp, &path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io { path, source });
        }

        debug!(tile = %tile, bytes = data.len(), "Tile stored");
        Ok(())
    }

    /// Returns some existing tile at `zoom`, if any.
    ///
    /// Which tile is returned depends on directory iteration order and is not
    /// specified.
    pub fn find_any_tile(&self, zoom: u8) -> Option<TileCoord> {
        let zoom_dir = self.root.join(zoom.to_string());
        for x in numeric_subdirs(&zoom_dir) {
            let x_dir = zoom_dir.join(x.to_string());
            if let Some(y) = tile_rows(&x_dir).next() {
                return Some(TileCoord::new(zoom, x, y));
            }
        }
        None
    }

    /// Whether at least one tile exists at any of the given zoom levels.
    pub fn has_any_tile(&self, zoom_levels: &[u8]) -> bool {
        zoom_levels
            .iter()
            .any(|&zoom| self.find_any_tile(zoom).is_some())
    }

    /// All tiles stored at `zoom`, in no particular order.
    pub fn tiles_at(&self, zoom: u8) -> Vec<TileCoord> {
        let zoom_dir = self.root.join(zoom.to_string());
        numeric_subdirs(&zoom_dir)
            .flat_map(|x| {
                tile_rows(&zoom_dir.join(x.to_string()))
                    .map(move |y| TileCoord::new(zoom, x, y))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Zoom levels that have a directory under the root, ascending.
    pub fn zoom_levels(&self) -> Vec<u8> {
        let mut zooms: Vec<u8> = numeric_subdirs(&self.root)
            .filter_map(|z| u8::try_from(z).ok())
            .collect();
        zooms.sort_unstable();
        zooms
    }

    /// Counts stored tiles and their total size.
    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Io {
                path: self.root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "cache root missing"),
            });
        }

        let mut stats = CacheStats::default();
        for zoom in self.zoom_levels() {
            let zoom_dir = self.root.join(zoom.to_string());
            for x in numeric_subdirs(&zoom_dir) {
                let x_dir = zoom_dir.join(x.to_string());
                for y in tile_rows(&x_dir) {
                    let path = x_dir.join(format!("{}.{}", y, TILE_EXTENSION));
                    if let Ok(meta) = fs::metadata(&path) {
                        stats.tiles += 1;
                        stats.bytes += meta.len();
                    }
                }
            }
        }
        Ok(stats)
    }

    /// Async wrapper around [`exists`](Self::exists).
    pub async fn contains(&self, tile: TileCoord) -> bool {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.exists(&tile))
            .await
            .unwrap_or(false)
    }

    /// Async wrapper around [`read`](Self::read).
    pub async fn get(&self, tile: TileCoord) -> Result<Vec<u8>, StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read(&tile))
            .await
            .map_err(|e| StoreError::Io {
                path: self.tile_path(&tile),
                source: io::Error::other(e.to_string()),
            })?
    }

    /// Async wrapper around [`write`](Self::write).
    pub async fn put(&self, tile: TileCoord, data: Vec<u8>) -> Result<(), StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.write(&tile, &data))
            .await
            .map_err(|e| StoreError::Io {
                path: self.tile_path(&tile),
                source: io::Error::other(e.to_string()),
            })?
    }
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Subdirectories of `dir` whose names are plain unsigned integers.
fn numeric_subdirs(dir: &Path) -> impl Iterator<Item = u32> {
    fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
}

/// Row numbers of the `{y}.png` files in a column directory.
///
/// Hidden temporary files and anything else are skipped.
fn tile_rows(dir: &Path) -> impl Iterator<Item = u32> {
    fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name();
            let stem = name.to_str()?.strip_suffix(".png")?.to_string();
            stem.parse::<u32>().ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_tile_path_construction() {
        let store = TileStore {
            root: Arc::new(PathBuf::from("/cache")),
        };
        let path = store.tile_path(&TileCoord::new(16, 38684, 25290));
        assert_eq!(path, PathBuf::from("/cache/16/38684/25290.png"));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store();
        let tile = TileCoord::new(15, 100, 200);

        assert!(!store.exists(&tile));
        store.write(&tile, &[0xFF, 0xD8, 0xFF]).unwrap();
        assert!(store.exists(&tile));
        assert_eq!(store.read(&tile).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_dir, store) = store();
        let tile = TileCoord::new(15, 1, 2);
        assert!(matches!(store.read(&tile), Err(StoreError::NotFound(t)) if t == tile));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let (_dir, store) = store();
        let tile = TileCoord::new(14, 7, 9);
        store.write(&tile, b"tile").unwrap();

        let parent = store.tile_path(&tile).parent().unwrap().to_path_buf();
        let names: Vec<String> = fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["9.png".to_string()]);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let (_dir, store) = store();
        let tile = TileCoord::new(14, 7, 9);
        store.write(&tile, b"old").unwrap();
        store.write(&tile, b"new").unwrap();
        assert_eq!(store.read(&tile).unwrap(), b"new".to_vec());
    }

    #[test]
    fn test_find_any_tile_ignores_temp_and_foreign_files() {
        let (dir, store) = store();
        let x_dir = dir.path().join("16").join("123");
        fs::create_dir_all(&x_dir).unwrap();
        fs::write(x_dir.join(".5.png.1.0.tmp"), b"partial").unwrap();
        fs::write(x_dir.join("notes.txt"), b"hi").unwrap();

        assert_eq!(store.find_any_tile(16), None);

        fs::write(x_dir.join("456.png"), b"tile").unwrap();
        assert_eq!(store.find_any_tile(16), Some(TileCoord::new(16, 123, 456)));
    }

    #[test]
    fn test_find_any_tile_empty_zoom() {
        let (_dir, store) = store();
        assert_eq!(store.find_any_tile(16), None);
        assert!(!store.has_any_tile(&[14, 15, 16, 17, 18]));
    }

    #[test]
    fn test_has_any_tile_only_checks_requested_zooms() {
        let (_dir, store) = store();
        store.write(&TileCoord::new(10, 1, 1), b"x").unwrap();

        assert!(!store.has_any_tile(&[14, 15, 16]));
        assert!(store.has_any_tile(&[10]));
    }

    #[test]
    fn test_tiles_at_and_zoom_levels() {
        let (_dir, store) = store();
        let tiles = [
            TileCoord::new(16, 1, 1),
            TileCoord::new(16, 1, 2),
            TileCoord::new(16, 3, 1),
            TileCoord::new(14, 0, 0),
        ];
        for t in &tiles {
            store.write(t, b"x").unwrap();
        }

        let mut at16 = store.tiles_at(16);
        at16.sort();
        assert_eq!(at16, tiles[..3].to_vec());
        assert_eq!(store.zoom_levels(), vec![14, 16]);
    }

    #[test]
    fn test_stats_counts_tiles_and_bytes() {
        let (_dir, store) = store();
        store.write(&TileCoord::new(14, 1, 1), &[0; 10]).unwrap();
        store.write(&TileCoord::new(15, 2, 2), &[0; 22]).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.tiles, 2);
        assert_eq!(stats.bytes, 32);
    }

    #[test]
    fn test_concurrent_writes_share_parent_directory() {
        let (_dir, store) = store();
        let handles: Vec<_> = (0..16)
            .map(|y| {
                let store = store.clone();
                std::thread::spawn(move || store.write(&TileCoord::new(17, 42, y), &[y as u8; 64]))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(store.tiles_at(17).len(), 16);
    }

    #[tokio::test]
    async fn test_async_roundtrip() {
        let (_dir, store) = store();
        let tile = TileCoord::new(18, 5, 6);

        assert!(!store.contains(tile).await);
        store.put(tile, vec![1, 2, 3]).await.unwrap();
        assert!(store.contains(tile).await);
        assert_eq!(store.get(tile).await.unwrap(), vec![1, 2, 3]);
    }
}
