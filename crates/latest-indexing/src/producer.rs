//! Catalog producer.
//!
//! Walks the catalog pages that may hold commits inside the pass window,
//! turns every leaf in the window into a [`CatalogEvent`] and hands it to an
//! [`EventSink`]. The sink enqueues the package id and raises the pass
//! watermark.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use latest_protocol::CatalogSource;
use latest_types::{CatalogEventKind, CatalogLeafItem, CatalogPageItem};

use crate::cancel::or_cancelled;
use crate::channel::IdentifierSender;
use crate::error::IndexingError;
use crate::watermark::Watermark;

/// The commit range a pass covers: `min < commit <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogWindow {
    /// Exclusive lower bound, the persisted cursor
    pub min: DateTime<Utc>,
    /// Inclusive upper bound, captured when the pass starts
    pub max: DateTime<Utc>,
    /// Read at most this many pages, oldest first
    pub max_pages: Option<usize>,
}

impl CatalogWindow {
    /// Whether `timestamp` falls in the window.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp > self.min && timestamp <= self.max
    }
}

/// One catalog leaf, reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEvent {
    /// Package identifier as written in the catalog
    pub package_id: String,
    /// Package version as written in the catalog
    pub package_version: String,
    /// Commit timestamp of the leaf
    pub commit_timestamp: DateTime<Utc>,
    /// What happened
    pub kind: CatalogEventKind,
}

impl From<&CatalogLeafItem> for CatalogEvent {
    fn from(leaf: &CatalogLeafItem) -> Self {
        Self {
            package_id: leaf.package_id.clone(),
            package_version: leaf.package_version.clone(),
            commit_timestamp: leaf.commit_timestamp,
            kind: leaf.kind(),
        }
    }
}

/// Destination for catalog events during one pass.
pub struct EventSink {
    sender: IdentifierSender,
    watermark: Arc<Watermark>,
    events: AtomicUsize,
}

impl EventSink {
    /// Create a sink feeding `sender` and raising `watermark`.
    pub fn new(sender: IdentifierSender, watermark: Arc<Watermark>) -> Self {
        Self {
            sender,
            watermark,
            events: AtomicUsize::new(0),
        }
    }

    /// Enqueue the event's package and record its commit timestamp.
    ///
    /// The timestamp is recorded only after the identifier is queued (or
    /// found to be a duplicate), so the watermark never runs ahead of work
    /// that has been handed to the workers.
    pub async fn emit(
        &self,
        event: CatalogEvent,
        token: &CancellationToken,
    ) -> Result<(), IndexingError> {
        let enqueued = self.sender.send(&event.package_id, token).await?;
        self.watermark.observe(event.commit_timestamp);
        self.events.fetch_add(1, Ordering::Relaxed);
        debug!(
            package_id = %event.package_id,
            version = %event.package_version,
            kind = %event.kind,
            enqueued,
            "Catalog event"
        );
        Ok(())
    }

    /// Close the underlying channel.
    pub fn close(&self) -> bool {
        self.sender.close()
    }

    /// Events emitted so far.
    pub fn events(&self) -> usize {
        self.events.load(Ordering::Relaxed)
    }

    /// Distinct packages enqueued so far.
    pub fn enqueued(&self) -> usize {
        self.sender.accepted()
    }

    /// The pass watermark.
    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }
}

/// What a producer read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProduceStats {
    /// Catalog pages read
    pub pages: usize,
    /// Leaves inside the window
    pub leaves: usize,
}

/// Source of catalog events for a window.
#[async_trait]
pub trait CatalogProducer: Send + Sync {
    /// Emit every event in `window` into `sink`.
    ///
    /// Must return only after every event has been emitted, or with an error.
    async fn produce(
        &self,
        window: &CatalogWindow,
        sink: &EventSink,
        token: &CancellationToken,
    ) -> Result<ProduceStats, IndexingError>;
}

/// Producer that reads the catalog through a [`CatalogSource`].
pub struct HttpCatalogProducer {
    source: Arc<dyn CatalogSource>,
    workers: usize,
}

impl HttpCatalogProducer {
    /// Read up to `workers` pages concurrently.
    pub fn new(source: Arc<dyn CatalogSource>, workers: usize) -> Self {
        Self {
            source,
            workers: workers.max(1),
        }
    }

    async fn process_page(
        &self,
        page: CatalogPageItem,
        window: &CatalogWindow,
        sink: &EventSink,
        token: &CancellationToken,
    ) -> Result<usize, IndexingError> {
        let content = or_cancelled(token, self.source.get_page(&page.url)).await?;
        let leaves = content.leaves_within(window.min, window.max);
        debug!(page = %page.url, leaves = leaves.len(), "Read catalog page");

        for leaf in &leaves {
            sink.emit(CatalogEvent::from(leaf), token).await?;
        }
        Ok(leaves.len())
    }
}

#[async_trait]
impl CatalogProducer for HttpCatalogProducer {
    async fn produce(
        &self,
        window: &CatalogWindow,
        sink: &EventSink,
        token: &CancellationToken,
    ) -> Result<ProduceStats, IndexingError> {
        let index = or_cancelled(token, self.source.get_index()).await?;

        let mut pages = index.pages_after(window.min);
        let available = pages.len();
        if let Some(cap) = window.max_pages {
            pages.truncate(cap);
        }
        info!(
            available,
            selected = pages.len(),
            min = %window.min.to_rfc3339(),
            max = %window.max.to_rfc3339(),
            "Reading catalog pages"
        );

        let mut stats = ProduceStats {
            pages: pages.len(),
            leaves: 0,
        };

        let mut results = stream::iter(pages)
            .map(|page| self.process_page(page, window, sink, token))
            .buffer_unordered(self.workers);

        // The first failure drops the stream, abandoning in-flight pages.
        while let Some(result) = results.next().await {
            stats.leaves += result?;
        }

        Ok(stats)
    }
}
