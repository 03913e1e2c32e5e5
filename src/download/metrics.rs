//! Request counters shared by every fetch and download.
//!
//! The executor does not own global state: it receives a [`MetricsSink`]
//! and reports one increment per event. [`AtomicRequestCounters`] is the
//! in-process implementation and is safe to share across tasks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

/// The three request counters emitted by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestCounter {
    /// Incremented before every attempt.
    TotalRequests,
    /// Incremented for every attempt that produced a success status.
    GoodRequests,
    /// Incremented for every failed attempt (status or transport error).
    BadRequests,
}

impl RequestCounter {
    /// Stable metric name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TotalRequests => "url_total_requests",
            Self::GoodRequests => "url_good_requests",
            Self::BadRequests => "url_bad_requests",
        }
    }
}

/// Receives counter increments.
pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// Adds `value` to `counter`.
    fn add(&self, counter: RequestCounter, value: u64);
}

/// Point-in-time copy of [`AtomicRequestCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Attempts started.
    pub total_requests: u64,
    /// Attempts that succeeded.
    pub good_requests: u64,
    /// Attempts that failed.
    pub bad_requests: u64,
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} {}={} {}={}",
            RequestCounter::TotalRequests.name(),
            self.total_requests,
            RequestCounter::GoodRequests.name(),
            self.good_requests,
            RequestCounter::BadRequests.name(),
            self.bad_requests,
        )
    }
}

/// Lock-free counters backing the default [`MetricsSink`].
#[derive(Debug, Default)]
pub struct AtomicRequestCounters {
    total_requests: AtomicU64,
    good_requests: AtomicU64,
    bad_requests: AtomicU64,
}

impl AtomicRequestCounters {
    /// Creates counters starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current value of `counter`.
    #[must_use]
    pub fn get(&self, counter: RequestCounter) -> u64 {
        self.slot(counter).load(Ordering::SeqCst)
    }

    /// Returns all three counters.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_requests: self.get(RequestCounter::TotalRequests),
            good_requests: self.get(RequestCounter::GoodRequests),
            bad_requests: self.get(RequestCounter::BadRequests),
        }
    }

    fn slot(&self, counter: RequestCounter) -> &AtomicU64 {
        match counter {
            RequestCounter::TotalRequests => &self.total_requests,
            RequestCounter::GoodRequests => &self.good_requests,
            RequestCounter::BadRequests => &self.bad_requests,
        }
    }
}

impl MetricsSink for AtomicRequestCounters {
    fn add(&self, counter: RequestCounter, value: u64) {
        let updated = self.slot(counter).fetch_add(value, Ordering::SeqCst) + value;
        trace!(counter = counter.name(), value = updated, "request counter updated");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counter_names() {
        assert_eq!(RequestCounter::TotalRequests.name(), "url_total_requests");
        assert_eq!(RequestCounter::GoodRequests.name(), "url_good_requests");
        assert_eq!(RequestCounter::BadRequests.name(), "url_bad_requests");
    }

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(AtomicRequestCounters::new().snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_snapshot_display_uses_counter_names() {
        let counters = AtomicRequestCounters::new();
        counters.add(RequestCounter::TotalRequests, 3);
        counters.add(RequestCounter::GoodRequests, 1);
        counters.add(RequestCounter::BadRequests, 2);

        assert_eq!(
            counters.snapshot().to_string(),
            "url_total_requests=3 url_good_requests=1 url_bad_requests=2"
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let counters = Arc::new(AtomicRequestCounters::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let counters = Arc::clone(&counters);
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    counters.add(RequestCounter::TotalRequests, 1);
                    counters.add(RequestCounter::BadRequests, 1);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap_or_else(|e| panic!("task panicked: {e}"));
        }

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.total_requests, 16_000);
        assert_eq!(snapshot.bad_requests, 16_000);
        assert_eq!(snapshot.good_requests, 0);
    }
}
