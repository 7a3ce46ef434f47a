//! Package metadata worker and pool.
//!
//! A worker turns one package id into its three "latest" documents: fetch
//! the registration index, inline referenced pages, rank, write. The pool
//! runs a fixed number of workers against an [`IdentifierReceiver`] until
//! the channel is closed and drained or shutdown is requested.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use latest_protocol::RegistrationSource;

use crate::cancel::or_cancelled;
use crate::channel::IdentifierReceiver;
use crate::error::IndexingError;
use crate::ranking::{inline_registration_index, rank};
use crate::retry::RetryPolicy;
use crate::writer::LatestWriter;

/// Result of processing one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Documents were written
    Written {
        /// Version in the stable slot
        stable: Option<String>,
        /// Version in the prerelease slot
        prerelease: Option<String>,
    },
    /// The package has no registration; nothing was written
    NotFound,
}

/// Counters for one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Packages whose documents were written
    pub written: usize,
    /// Packages without a registration
    pub not_found: usize,
    /// Packages dropped because of shutdown
    pub abandoned: usize,
}

impl PoolStats {
    /// Packages fully handled.
    pub fn processed(&self) -> usize {
        self.written + self.not_found
    }

    fn merge(&mut self, other: PoolStats) {
        self.written += other.written;
        self.not_found += other.not_found;
        self.abandoned += other.abandoned;
    }
}

/// Recomputes the documents of one package at a time.
pub struct PackageMetadataWorker {
    registration: Arc<dyn RegistrationSource>,
    writer: LatestWriter,
    retry: RetryPolicy,
}

impl PackageMetadataWorker {
    /// Create a worker.
    pub fn new(
        registration: Arc<dyn RegistrationSource>,
        writer: LatestWriter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registration,
            writer,
            retry,
        }
    }

    /// The document writer.
    pub fn writer(&self) -> &LatestWriter {
        &self.writer
    }

    /// One attempt at processing `package_id`.
    pub async fn process(
        &self,
        package_id: &str,
        token: &CancellationToken,
    ) -> Result<ProcessOutcome, IndexingError> {
        let Some(index) = or_cancelled(token, self.registration.get_index(package_id)).await?
        else {
            debug!(package_id, "No registration, skipping");
            return Ok(ProcessOutcome::NotFound);
        };

        let index = match inline_registration_index(self.registration.as_ref(), index, token).await {
            Ok(index) => index,
            Err(e) if e.is_not_found() => {
                debug!(package_id, error = %e, "Registration page vanished, skipping");
                return Ok(ProcessOutcome::NotFound);
            }
            Err(e) => return Err(e),
        };

        let responses = rank(&index);
        or_cancelled(token, self.writer.write(package_id, &responses)).await?;

        let outcome = ProcessOutcome::Written {
            stable: responses.latest.stable.map(|m| m.version),
            prerelease: responses.latest.prerelease.map(|m| m.version),
        };
        debug!(package_id, outcome = ?outcome, "Processed package");
        Ok(outcome)
    }

    /// Process `package_id`, retrying until it succeeds or `token` fires.
    pub async fn process_with_retry(
        &self,
        package_id: &str,
        token: &CancellationToken,
    ) -> Result<ProcessOutcome, IndexingError> {
        self.retry
            .run(package_id, token, || self.process(package_id, token))
            .await
    }

    /// Run `workers` workers until `receiver` is drained or `token` fires.
    ///
    /// Fails only if a worker task panicked; in that case some identifiers
    /// may not have been processed.
    pub async fn run_pool(
        self: Arc<Self>,
        receiver: IdentifierReceiver,
        workers: usize,
        token: CancellationToken,
    ) -> Result<PoolStats, IndexingError> {
        let mut tasks = JoinSet::new();
        for worker_id in 0..workers.max(1) {
            let worker = self.clone();
            let receiver = receiver.clone();
            let token = token.clone();
            tasks.spawn(async move { worker.drain(worker_id, receiver, token).await });
        }
        drop(receiver);

        let mut stats = PoolStats::default();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                    failure.get_or_insert_with(|| IndexingError::Worker(e.to_string()));
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if stats.abandoned > 0 {
            info!(abandoned = stats.abandoned, "Workers stopped on shutdown");
        }
        Ok(stats)
    }

    async fn drain(
        &self,
        worker_id: usize,
        receiver: IdentifierReceiver,
        token: CancellationToken,
    ) -> PoolStats {
        let mut stats = PoolStats::default();

        while let Some(package_id) = receiver.recv(&token).await {
            match self.process_with_retry(&package_id, &token).await {
                Ok(ProcessOutcome::Written { .. }) => stats.written += 1,
                Ok(ProcessOutcome::NotFound) => stats.not_found += 1,
                Err(e) => {
                    // Retries only end early on shutdown.
                    debug!(worker_id, package_id = %package_id, error = %e, "Abandoned package");
                    stats.abandoned += 1;
                    break;
                }
            }
        }

        debug!(worker_id, processed = stats.processed(), "Worker finished");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::identifier_channel;
    use crate::writer::LatestVariant;
    use async_trait::async_trait;
    use latest_protocol::ProtocolError;
    use latest_storage::{BlobStore, MemoryBlobStore};
    use latest_types::{PackageMetadata, RegistrationIndex, RegistrationLeaf, RegistrationPage};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRegistrations {
        indexes: HashMap<String, RegistrationIndex>,
        pages: HashMap<String, RegistrationPage>,
        failures: Mutex<HashMap<String, usize>>,
        index_calls: AtomicUsize,
    }

    impl FakeRegistrations {
        fn with_package(mut self, id: &str, versions: &[(&str, bool)]) -> Self {
            let leaves = versions
                .iter()
                .map(|(v, listed)| RegistrationLeaf {
                    url: format!("https://example.test/reg/{}/{}.json", id.to_lowercase(), v),
                    catalog_entry: PackageMetadata::new(*v, *listed),
                })
                .collect();
            self.indexes.insert(
                id.to_lowercase(),
                RegistrationIndex {
                    url: format!("https://example.test/reg/{}/index.json", id.to_lowercase()),
                    count: 1,
                    pages: vec![RegistrationPage {
                        url: format!("https://example.test/reg/{}/page.json", id.to_lowercase()),
                        count: versions.len(),
                        lower: None,
                        upper: None,
                        leaves: Some(leaves),
                    }],
                },
            );
            self
        }

        fn with_referenced_page(mut self, id: &str) -> Self {
            let key = id.to_lowercase();
            if let Some(index) = self.indexes.get_mut(&key) {
                let page = index.pages[0].clone();
                index.pages[0].leaves = None;
                self.pages.insert(page.url.clone(), page);
            }
            self
        }

        fn failing(self, id: &str, times: usize) -> Self {
            self.failures.lock().unwrap().insert(id.to_lowercase(), times);
            self
        }
    }

    #[async_trait]
    impl RegistrationSource for FakeRegistrations {
        async fn get_index(&self, package_id: &str) -> Result<Option<RegistrationIndex>, ProtocolError> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            let key = package_id.to_lowercase();
            if let Some(remaining) = self.failures.lock().unwrap().get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ProtocolError::Status {
                        url: key.clone(),
                        status: 500,
                    });
                }
            }
            Ok(self.indexes.get(&key).cloned())
        }

        async fn get_page(&self, url: &str) -> Result<RegistrationPage, ProtocolError> {
            self.pages.get(url).cloned().ok_or_else(|| ProtocolError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn worker(source: FakeRegistrations, store: &MemoryBlobStore) -> PackageMetadataWorker {
        PackageMetadataWorker::new(
            Arc::new(source),
            LatestWriter::new(Arc::new(store.clone())),
            RetryPolicy::fixed(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn test_process_foo_bar() {
        let store = MemoryBlobStore::new();
        let source = FakeRegistrations::default().with_package(
            "Foo.Bar",
            &[("1.0.0", true), ("1.1.0-beta", true), ("2.0.0", false)],
        );
        let worker = worker(source, &store);

        let outcome = worker.process("Foo.Bar", &CancellationToken::new()).await.unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Written {
                stable: Some("1.0.0".to_string()),
                prerelease: Some("1.1.0-beta".to_string()),
            }
        );

        let latest = worker
            .writer()
            .read("foo.bar", LatestVariant::Latest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.stable.unwrap().version, "1.0.0");
        assert_eq!(latest.prerelease.unwrap().version, "1.1.0-beta");
    }

    #[tokio::test]
    async fn test_referenced_page_ranks_like_inlined() {
        let versions = [("1.0.0", true), ("1.1.0-beta", true), ("2.0.0", false)];

        let inline_store = MemoryBlobStore::new();
        worker(
            FakeRegistrations::default().with_package("Foo.Bar", &versions),
            &inline_store,
        )
        .process("Foo.Bar", &CancellationToken::new())
        .await
        .unwrap();

        let referenced_store = MemoryBlobStore::new();
        worker(
            FakeRegistrations::default()
                .with_package("Foo.Bar", &versions)
                .with_referenced_page("Foo.Bar"),
            &referenced_store,
        )
        .process("Foo.Bar", &CancellationToken::new())
        .await
        .unwrap();

        for name in inline_store.names() {
            let a = inline_store.get(&name).await.unwrap().unwrap();
            let b = referenced_store.get(&name).await.unwrap().unwrap();
            assert_eq!(a, b, "{name}");
        }
    }

    #[tokio::test]
    async fn test_missing_package_writes_nothing() {
        let store = MemoryBlobStore::new();
        let worker = worker(FakeRegistrations::default(), &store);

        let outcome = worker.process("Gone", &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::NotFound);
        assert!(store.names().is_empty());
    }

    #[tokio::test]
    async fn test_vanished_page_writes_nothing() {
        let store = MemoryBlobStore::new();
        let mut source = FakeRegistrations::default()
            .with_package("Foo.Bar", &[("1.0.0", true)])
            .with_referenced_page("Foo.Bar");
        source.pages.clear();
        let worker = worker(source, &store);

        let outcome = worker.process("Foo.Bar", &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::NotFound);
        assert!(store.names().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let store = MemoryBlobStore::new();
        let source = FakeRegistrations::default()
            .with_package("Foo.Bar", &[("1.0.0", true)])
            .failing("Foo.Bar", 2);
        let worker = worker(source, &store);

        let outcome = worker
            .process_with_retry("Foo.Bar", &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Written { .. }));
        assert_eq!(store.names().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_failures_are_retried() {
        let store = MemoryBlobStore::new();
        store.fail_next_puts(1);
        let source = FakeRegistrations::default().with_package("Foo.Bar", &[("1.0.0", true)]);
        let worker = worker(source, &store);

        worker
            .process_with_retry("Foo.Bar", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.put_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_drains_channel() {
        let store = MemoryBlobStore::new();
        let source = FakeRegistrations::default()
            .with_package("A", &[("1.0.0", true)])
            .with_package("B", &[("2.0.0-rc", true)])
            .with_package("C", &[("3.0.0", true)])
            .failing("B", 3);
        let worker = Arc::new(worker(source, &store));

        let token = CancellationToken::new();
        let (tx, rx) = identifier_channel(8);
        for id in ["A", "B", "C", "Missing"] {
            tx.send(id, &token).await.unwrap();
        }
        tx.close();

        let stats = worker.run_pool(rx, 3, token).await.unwrap();
        assert_eq!(
            stats,
            PoolStats {
                written: 3,
                not_found: 1,
                abandoned: 0
            }
        );
        assert_eq!(store.names().len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_stops_on_cancellation() {
        let store = MemoryBlobStore::new();
        let source = FakeRegistrations::default()
            .with_package("Stuck", &[("1.0.0", true)])
            .failing("Stuck", usize::MAX);
        let worker = Arc::new(worker(source, &store));

        let token = CancellationToken::new();
        let (tx, rx) = identifier_channel(8);
        tx.send("Stuck", &token).await.unwrap();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            canceller.cancel();
        });

        let stats = worker.run_pool(rx, 2, token).await.unwrap();
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.processed(), 0);
        assert!(store.names().is_empty());
    }
}
