//! The catalog-to-latest job.
//!
//! One pass reads the cursor, runs the producer and a fresh worker pool
//! against a fresh identifier channel, waits for the pool to drain, then
//! advances the cursor to the highest commit timestamp the producer
//! observed. [`LatestJob::run`] repeats passes with a sleep in between until
//! the cancellation token fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use latest_storage::CursorStore;
use latest_types::Settings;

use crate::cancel::{or_cancelled, sleep_or_cancelled};
use crate::channel::identifier_channel;
use crate::error::IndexingError;
use crate::producer::{CatalogProducer, CatalogWindow, EventSink};
use crate::watermark::Watermark;
use crate::worker::{PackageMetadataWorker, ProcessOutcome};

/// Job settings, snapshotted when the job is built.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Lower bound used while no cursor exists
    pub default_min_cursor: DateTime<Utc>,
    /// Pause between passes
    pub sleep_duration: Duration,
    /// Cap on catalog pages per pass
    pub max_pages: Option<usize>,
    /// Worker pool size
    pub consumer_workers: usize,
    /// Identifier channel capacity
    pub channel_capacity: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl JobConfig {
    /// Snapshot the job-related settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_min_cursor: settings.default_min_cursor,
            sleep_duration: settings.sleep_duration(),
            max_pages: settings.max_pages,
            consumer_workers: settings.consumer_workers,
            channel_capacity: settings.channel_capacity,
        }
    }

    /// Override the page cap.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Override the pause between passes.
    pub fn with_sleep_duration(mut self, sleep_duration: Duration) -> Self {
        self.sleep_duration = sleep_duration;
        self
    }

    /// Override the pool size.
    pub fn with_consumer_workers(mut self, workers: usize) -> Self {
        self.consumer_workers = workers;
        self
    }

    /// Override the channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

/// Summary of one completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassResult {
    /// Cursor read at the start of the pass
    pub previous_cursor: Option<DateTime<Utc>>,
    /// Exclusive lower bound used
    pub lower_bound: DateTime<Utc>,
    /// Inclusive upper bound used
    pub upper_bound: DateTime<Utc>,
    /// Cursor written at the end of the pass, if it advanced
    pub new_cursor: Option<DateTime<Utc>>,
    /// Catalog pages read
    pub pages: usize,
    /// Catalog events seen
    pub events: usize,
    /// Distinct packages enqueued
    pub enqueued: usize,
    /// Packages whose documents were written
    pub written: usize,
    /// Packages without a registration
    pub not_found: usize,
    /// Wall time of the pass
    pub duration: Duration,
}

impl PassResult {
    /// Packages fully handled.
    pub fn processed(&self) -> usize {
        self.written + self.not_found
    }

    /// Whether the cursor moved.
    pub fn advanced(&self) -> bool {
        self.new_cursor.is_some()
    }
}

/// Cursor-driven catalog-to-latest job.
pub struct LatestJob {
    cursor: Arc<dyn CursorStore>,
    producer: Arc<dyn CatalogProducer>,
    worker: Arc<PackageMetadataWorker>,
    config: JobConfig,
}

impl LatestJob {
    /// Create a job.
    pub fn new(
        cursor: Arc<dyn CursorStore>,
        producer: Arc<dyn CatalogProducer>,
        worker: Arc<PackageMetadataWorker>,
        config: JobConfig,
    ) -> Self {
        Self {
            cursor,
            producer,
            worker,
            config,
        }
    }

    /// The job configuration.
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run passes until `token` is cancelled.
    ///
    /// A failed pass is logged and retried after the usual sleep; the cursor
    /// is left where it was. Cancellation ends the loop with `Ok(())`.
    pub async fn run(&self, token: CancellationToken) -> Result<(), IndexingError> {
        info!(
            sleep_secs = self.config.sleep_duration.as_secs(),
            workers = self.config.consumer_workers,
            max_pages = ?self.config.max_pages,
            "Starting catalog2latest job"
        );

        loop {
            match self.run_pass(&token).await {
                Ok(result) => {
                    info!(
                        pages = result.pages,
                        events = result.events,
                        enqueued = result.enqueued,
                        processed = result.processed(),
                        cursor = ?result.new_cursor.map(|c| c.to_rfc3339()),
                        duration_ms = result.duration.as_millis() as u64,
                        "Pass complete"
                    );
                }
                Err(IndexingError::Cancelled) => break,
                Err(e) => {
                    error!(error = %e, "Pass failed, cursor not advanced");
                }
            }

            debug!(secs = self.config.sleep_duration.as_secs(), "Sleeping");
            if !sleep_or_cancelled(&token, self.config.sleep_duration).await {
                break;
            }
        }

        info!("Catalog2latest job stopped");
        Ok(())
    }

    /// Run a single pass.
    ///
    /// Returns [`IndexingError::Cancelled`] if `token` fires at any point;
    /// the cursor is never written for an incomplete pass.
    pub async fn run_pass(&self, token: &CancellationToken) -> Result<PassResult, IndexingError> {
        let started = Instant::now();
        let previous_cursor = or_cancelled(token, self.cursor.get()).await?;
        let window = CatalogWindow {
            min: previous_cursor.unwrap_or(self.config.default_min_cursor),
            max: Utc::now(),
            max_pages: self.config.max_pages,
        };
        info!(
            cursor = ?previous_cursor.map(|c| c.to_rfc3339()),
            lower = %window.min.to_rfc3339(),
            upper = %window.max.to_rfc3339(),
            "Starting pass"
        );

        let (sender, receiver) = identifier_channel(self.config.channel_capacity);
        let sink = EventSink::new(sender, Arc::new(Watermark::new()));
        let pool = tokio::spawn(self.worker.clone().run_pool(
            receiver,
            self.config.consumer_workers,
            token.clone(),
        ));

        let produced = self.producer.produce(&window, &sink, token).await;
        sink.close();

        // Drained: the pool has handled everything that was enqueued.
        let pool_stats = pool
            .await
            .map_err(|e| IndexingError::Worker(e.to_string()))??;

        if token.is_cancelled() {
            return Err(IndexingError::Cancelled);
        }
        let produce_stats = produced?;

        let new_cursor = match sink.watermark().get() {
            Some(observed) if observed > window.min => {
                or_cancelled(token, self.cursor.set(observed)).await?;
                Some(observed)
            }
            _ => None,
        };

        Ok(PassResult {
            previous_cursor,
            lower_bound: window.min,
            upper_bound: window.max,
            new_cursor,
            pages: produce_stats.pages,
            events: sink.events(),
            enqueued: sink.enqueued(),
            written: pool_stats.written,
            not_found: pool_stats.not_found,
            duration: started.elapsed(),
        })
    }

    /// Recompute one package immediately, outside any pass.
    pub async fn process_package(
        &self,
        package_id: &str,
        token: &CancellationToken,
    ) -> Result<ProcessOutcome, IndexingError> {
        self.worker.process_with_retry(package_id, token).await
    }
}
