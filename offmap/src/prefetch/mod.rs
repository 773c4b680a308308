//! Region prefetch.
//!
//! Expands a center/radius/zoom request into its covering tile set and
//! downloads whatever the [`TileStore`](crate::cache::TileStore) does not
//! already hold.

mod fetcher;
mod job;

pub use fetcher::{FetchError, FetcherConfig, JobHandle, TileFetcher, DEFAULT_CONCURRENCY};
pub use job::{
    CompleteCallback, DownloadJob, FetchCallbacks, JobSummary, PrefetchRequest, ProgressCallback,
    TileError, TileOutcome,
};
