//! Incremental "latest version" indexing pipeline.
//!
//! This crate turns the package catalog into per-package "latest" documents.
//!
//! ## Key Components
//!
//! - [`identifier_channel`]: bounded, deduplicating queue of package ids
//! - [`CatalogProducer`] / [`HttpCatalogProducer`]: catalog events into the queue
//! - [`Watermark`]: highest commit timestamp observed during a pass
//! - [`rank`]: picks the latest stable and prerelease versions of a listing
//! - [`LatestWriter`]: compresses and stores the three documents per package
//! - [`RetryPolicy`]: unbounded retries with a capped backoff
//! - [`PackageMetadataWorker`]: the per-package worker and its pool
//! - [`LatestJob`]: the cursor-driven pass loop
//!
//! ## Architecture
//!
//! 1. The job reads the cursor and computes the pass window `(cursor, now]`
//! 2. The producer walks catalog pages in the window and enqueues package ids
//! 3. A fixed-size worker pool drains the queue, recomputing each package
//! 4. Once the queue is closed and drained, the cursor advances to the
//!    highest commit timestamp the producer observed
//! 5. The job sleeps and repeats until cancelled
//!
//! ## Example
//!
//! ```ignore
//! use latest_indexing::{JobConfig, LatestJob};
//!
//! let job = LatestJob::new(cursor, producer, worker, JobConfig::from_settings(&settings));
//! job.run(shutdown_token).await?;
//! ```

pub mod cancel;
pub mod channel;
pub mod error;
pub mod job;
pub mod producer;
pub mod ranking;
pub mod retry;
pub mod watermark;
pub mod worker;
pub mod writer;

pub use channel::{identifier_channel, IdentifierReceiver, IdentifierSender};
pub use error::IndexingError;
pub use job::{JobConfig, LatestJob, PassResult};
pub use producer::{
    CatalogEvent, CatalogProducer, CatalogWindow, EventSink, HttpCatalogProducer, ProduceStats,
};
pub use ranking::{inline_registration_index, rank};
pub use retry::RetryPolicy;
pub use watermark::Watermark;
pub use worker::{PackageMetadataWorker, PoolStats, ProcessOutcome};
pub use writer::{LatestVariant, LatestWriter};
