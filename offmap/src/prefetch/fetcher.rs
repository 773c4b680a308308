//! Concurrent region download into the tile store.
//!
//! The fetcher keeps a sliding window of tile attempts in flight:
//! 1. Start up to `concurrency` attempts
//! 2. As each attempt completes, record it and start the next tile
//! 3. Report progress after every attempt, then a summary at the end
//!
//! All counters live in the driving task. Attempts never touch them, which is
//! what keeps `completed` strictly increasing.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::TileStore;
use crate::coord::{CoordError, TileCoord};
use crate::provider::TileProvider;

use super::job::{
    DownloadJob, FetchCallbacks, JobSummary, PrefetchRequest, TileError, TileOutcome,
};

/// Default number of tile attempts in flight.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Job-level failures. Per-tile failures are counted, not raised.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid prefetch region: {0}")]
    Region(#[from] CoordError),

    #[error("prefetch task failed: {0}")]
    TaskFailed(String),
}

/// Configuration for the tile fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum tile attempts in flight.
    pub concurrency: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Downloads tile sets from a provider into a store.
#[derive(Clone)]
pub struct TileFetcher {
    store: TileStore,
    provider: Arc<dyn TileProvider>,
    config: FetcherConfig,
}

impl TileFetcher {
    pub fn new(store: TileStore, provider: Arc<dyn TileProvider>) -> Self {
        Self::with_config(store, provider, FetcherConfig::default())
    }

    pub fn with_config(
        store: TileStore,
        provider: Arc<dyn TileProvider>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Expands the request, then runs it on its own task and returns at once.
    ///
    /// An invalid region is rejected here, before any callback is taken over.
    pub fn spawn(
        &self,
        request: &PrefetchRequest,
        callbacks: FetchCallbacks,
    ) -> Result<JobHandle, FetchError> {
        let job = DownloadJob::new(request)?;
        Ok(self.spawn_job(job, callbacks))
    }

    /// Runs an already expanded job on its own task.
    pub fn spawn_job(&self, job: DownloadJob, callbacks: FetchCallbacks) -> JobHandle {
        let fetcher = self.clone();
        JobHandle::new(tokio::spawn(async move {
            Ok(fetcher.run_job(job, callbacks).await)
        }))
    }

    /// Expands the request and downloads every missing tile.
    pub async fn run(
        &self,
        request: &PrefetchRequest,
        callbacks: FetchCallbacks,
    ) -> Result<JobSummary, FetchError> {
        let job = DownloadJob::new(request)?;
        Ok(self.run_job(job, callbacks).await)
    }

    /// Drives `job` to completion.
    pub async fn run_job(&self, mut job: DownloadJob, callbacks: FetchCallbacks) -> JobSummary {
        info!(
            provider = self.provider.name(),
            center = %job.center,
            radius_m = job.radius_m,
            zoom_levels = ?job.zoom_levels,
            total = job.total,
            "Prefetch started"
        );

        let mut tiles = std::mem::take(&mut job.tiles).into_iter();
        let mut pending = FuturesUnordered::new();

        for tile in tiles.by_ref().take(self.config.concurrency.max(1)) {
            pending.push(self.attempt(tile));
        }

        while let Some((tile, outcome)) = pending.next().await {
            match &outcome {
                TileOutcome::Cached => debug!(tile = %tile, "Tile already cached"),
                TileOutcome::Downloaded { bytes } => debug!(tile = %tile, bytes, "Tile downloaded"),
                TileOutcome::Failed(e) => warn!(tile = %tile, error = %e, "Tile failed"),
            }

            job.record(&outcome);
            callbacks.progress(job.completed, job.total);

            if let Some(tile) = tiles.next() {
                pending.push(self.attempt(tile));
            }
        }

        let summary = job.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            total = summary.total,
            bytes = job.bytes_downloaded,
            "Prefetch complete"
        );

        callbacks.complete(summary);
        summary
    }

    /// Fetches one tile unless the store already has it.
    pub async fn fetch_tile(&self, tile: TileCoord) -> TileOutcome {
        if self.store.contains(tile).await {
            return TileOutcome::Cached;
        }

        let data = match self.provider.fetch(&tile).await {
            Ok(data) => data,
            Err(e) => return TileOutcome::Failed(TileError::Provider(e)),
        };

        let bytes = data.len();
        match self.store.put(tile, data).await {
            Ok(()) => TileOutcome::Downloaded { bytes },
            Err(e) => TileOutcome::Failed(TileError::Store(e)),
        }
    }

    async fn attempt(&self, tile: TileCoord) -> (TileCoord, TileOutcome) {
        (tile, self.fetch_tile(tile).await)
    }
}

/// Handle to a spawned prefetch.
#[derive(Debug)]
pub struct JobHandle {
    task: JoinHandle<Result<JobSummary, FetchError>>,
}

impl JobHandle {
    fn new(task: JoinHandle<Result<JobSummary, FetchError>>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the job and returns its summary.
    pub async fn join(self) -> Result<JobSummary, FetchError> {
        self.task
            .await
            .map_err(|e| FetchError::TaskFailed(e.to_string()))?
    }
}
