//! Download job state, per-tile outcomes and progress callbacks.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::cache::StoreError;
use crate::coord::{CoordError, GeoPoint, TileCoord, TileRegion};
use crate::provider::ProviderError;

/// Region to prefetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchRequest {
    pub center: GeoPoint,
    pub radius_m: f64,
    pub zoom_levels: Vec<u8>,
}

impl PrefetchRequest {
    pub fn new(center: GeoPoint, radius_m: f64, zoom_levels: impl Into<Vec<u8>>) -> Self {
        Self {
            center,
            radius_m,
            zoom_levels: zoom_levels.into(),
        }
    }

    /// Tile coverage of this request.
    pub fn region(&self) -> Result<TileRegion, CoordError> {
        TileRegion::covering(self.center, self.radius_m, &self.zoom_levels)
    }
}

/// Why a single tile could not be cached.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("download failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

/// Result of one tile attempt.
#[derive(Debug)]
pub enum TileOutcome {
    /// Already on disk; no request was made.
    Cached,
    /// Downloaded and written.
    Downloaded { bytes: usize },
    /// Counted as failed; nothing was written.
    Failed(TileError),
}

impl TileOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, TileOutcome::Failed(_))
    }
}

/// Final counts of a finished job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    /// Tiles present after the job, whether downloaded or already cached.
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `succeeded` that was already cached.
    pub skipped: usize,
    pub total: usize,
}

impl JobSummary {
    /// Tiles actually transferred during this job.
    pub fn downloaded(&self) -> usize {
        self.succeeded - self.skipped
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} tiles cached ({} downloaded, {} already present, {} failed)",
            self.succeeded,
            self.total,
            self.downloaded(),
            self.skipped,
            self.failed
        )
    }
}

/// A prefetch in progress.
///
/// Owned by the task driving it; counters are only mutated through
/// [`DownloadJob::record`], so `completed` moves by exactly one per attempt.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub center: GeoPoint,
    pub radius_m: f64,
    pub zoom_levels: Vec<u8>,
    pub tiles: Vec<TileCoord>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub completed: usize,
    pub total: usize,
    pub bytes_downloaded: u64,
}

impl DownloadJob {
    /// Expands a request into its full tile list.
    pub fn new(request: &PrefetchRequest) -> Result<Self, CoordError> {
        let region = request.region()?;
        let tiles: Vec<TileCoord> = region.tiles().collect();
        Ok(Self {
            center: request.center,
            radius_m: request.radius_m,
            zoom_levels: region.zoom_levels().collect(),
            total: tiles.len(),
            tiles,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            completed: 0,
            bytes_downloaded: 0,
        })
    }

    pub fn record(&mut self, outcome: &TileOutcome) {
        match outcome {
            TileOutcome::Cached => {
                self.succeeded += 1;
                self.skipped += 1;
            }
            TileOutcome::Downloaded { bytes } => {
                self.succeeded += 1;
                self.bytes_downloaded += *bytes as u64;
            }
            TileOutcome::Failed(_) => self.failed += 1,
        }
        self.completed += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            total: self.total,
        }
    }
}

/// Called after every tile attempt with `(completed, total)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Called once when the job finishes.
pub type CompleteCallback = Box<dyn FnOnce(JobSummary) + Send>;

/// Progress hooks for a prefetch job. Both are optional.
#[derive(Default)]
pub struct FetchCallbacks {
    on_progress: Option<ProgressCallback>,
    on_complete: Option<CompleteCallback>,
}

impl FetchCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(JobSummary) + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub(crate) fn progress(&self, completed: usize, total: usize) {
        if let Some(cb) = &self.on_progress {
            cb(completed, total);
        }
    }

    pub(crate) fn complete(self, summary: JobSummary) {
        if let Some(cb) = self.on_complete {
            cb(summary);
        }
    }
}

impl fmt::Debug for FetchCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
