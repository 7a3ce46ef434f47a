//! Highest commit timestamp observed during a pass.
//!
//! Many tasks may observe catalog leaves concurrently; the watermark keeps
//! the maximum with a lock-free `fetch_max` on nanoseconds since the epoch.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

const UNSET: i64 = i64::MIN;

/// Concurrent maximum of observed timestamps.
#[derive(Debug)]
pub struct Watermark {
    nanos: AtomicI64,
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

impl Watermark {
    /// An empty watermark.
    pub fn new() -> Self {
        Self {
            nanos: AtomicI64::new(UNSET),
        }
    }

    /// Record `timestamp`; keeps the larger of it and the current value.
    pub fn observe(&self, timestamp: DateTime<Utc>) {
        // Outside the representable range (years 1677..2262) clamp to the edge.
        let nanos = timestamp.timestamp_nanos_opt().unwrap_or(if timestamp.timestamp() < 0 {
            UNSET + 1
        } else {
            i64::MAX
        });
        self.nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    /// Highest observed timestamp, or `None` if nothing was observed.
    pub fn get(&self) -> Option<DateTime<Utc>> {
        match self.nanos.load(Ordering::Acquire) {
            UNSET => None,
            nanos => Some(DateTime::from_timestamp_nanos(nanos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn test_empty_is_none() {
        assert_eq!(Watermark::new().get(), None);
    }

    #[test]
    fn test_keeps_maximum() {
        let watermark = Watermark::new();
        let t1 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap();

        watermark.observe(t2);
        watermark.observe(t1);
        assert_eq!(watermark.get(), Some(t2));
    }

    #[test]
    fn test_preserves_sub_second_precision() {
        let watermark = Watermark::new();
        let ts = DateTime::parse_from_rfc3339("2021-03-04T05:06:07.1234567Z")
            .unwrap()
            .with_timezone(&Utc);
        watermark.observe(ts);
        assert_eq!(watermark.get(), Some(ts));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_observers() {
        let watermark = Arc::new(Watermark::new());
        let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();

        let mut handles = Vec::new();
        for task in 0..8i64 {
            let watermark = watermark.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100i64 {
                    watermark.observe(base + chrono::Duration::seconds(task * 100 + i));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(watermark.get(), Some(base + chrono::Duration::seconds(799)));
    }
}
