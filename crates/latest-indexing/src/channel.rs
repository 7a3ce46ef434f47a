//! Bounded, deduplicating channel of package identifiers.
//!
//! Each pass gets a fresh channel. The sending side remembers every
//! identifier it has accepted (case-insensitively), so a package touched by
//! many catalog leaves is processed once per pass. Sends wait while the
//! channel is full; that wait is the producer's backpressure.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::IndexingError;

/// Create a channel holding at most `capacity` pending identifiers.
pub fn identifier_channel(capacity: usize) -> (IdentifierSender, IdentifierReceiver) {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    let sender = IdentifierSender {
        tx,
        seen: Arc::new(Mutex::new(HashSet::new())),
        accepted: Arc::new(AtomicUsize::new(0)),
    };
    (sender, IdentifierReceiver { rx })
}

/// Sending half. Clones share the dedup set.
#[derive(Debug, Clone)]
pub struct IdentifierSender {
    tx: async_channel::Sender<String>,
    seen: Arc<Mutex<HashSet<String>>>,
    accepted: Arc<AtomicUsize>,
}

impl IdentifierSender {
    /// Enqueue `package_id` unless an equal identifier was already accepted.
    ///
    /// Returns `Ok(true)` when the identifier was enqueued and `Ok(false)`
    /// when it was a duplicate. Waits while the channel is full.
    pub async fn send(
        &self,
        package_id: &str,
        token: &CancellationToken,
    ) -> Result<bool, IndexingError> {
        if !self.remember(package_id) {
            return Ok(false);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(IndexingError::Cancelled),
            result = self.tx.send(package_id.to_string()) => {
                result.map_err(|_| IndexingError::ChannelClosed)?;
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
        }
    }

    fn remember(&self, package_id: &str) -> bool {
        let key = package_id.to_lowercase();
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(key)
    }

    /// Signal that no more identifiers will be sent.
    ///
    /// Receivers drain what is already queued. Returns `true` only for the
    /// call that actually closed the channel.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Number of distinct identifiers enqueued so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }
}

/// Receiving half. Clones compete for identifiers.
#[derive(Debug, Clone)]
pub struct IdentifierReceiver {
    rx: async_channel::Receiver<String>,
}

impl IdentifierReceiver {
    /// Next identifier, or `None` once the channel is closed and drained or
    /// `token` is cancelled.
    pub async fn recv(&self, token: &CancellationToken) -> Option<String> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            next = self.rx.recv() => next.ok(),
        }
    }

    /// Identifiers currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
