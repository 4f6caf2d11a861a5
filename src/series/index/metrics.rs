use std::sync::atomic::{AtomicU64, Ordering};
use strum_macros::{AsRefStr, Display, EnumIter};

/// Why a posting group was marked for lazy expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum LazyReason {
    /// The group requests too many keys relative to the estimated number of matched series.
    KeysLimit,
    /// Fetching the group's postings costs more than the series bytes it would save.
    PostingsSize,
}

/// Sink for the counters updated while planning lazy posting expansion.
pub trait LazyPostingsMetrics: Send + Sync {
    /// Adds the size of postings that were not fetched because their group is lazy.
    fn add_lazy_posting_bytes(&self, bytes: u64);
    fn inc_lazy_posting_groups(&self, reason: LazyReason);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl LazyPostingsMetrics for NoopMetrics {
    fn add_lazy_posting_bytes(&self, _bytes: u64) {}

    fn inc_lazy_posting_groups(&self, _reason: LazyReason) {}
}

#[derive(Debug, Default)]
pub struct LazyPostingsCounters {
    lazy_posting_size_bytes: AtomicU64,
    keys_limit_groups: AtomicU64,
    postings_size_groups: AtomicU64,
}

impl LazyPostingsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy_posting_size_bytes(&self) -> u64 {
        self.lazy_posting_size_bytes.load(Ordering::Relaxed)
    }

    pub fn lazy_posting_groups(&self, reason: LazyReason) -> u64 {
        self.counter(reason).load(Ordering::Relaxed)
    }

    fn counter(&self, reason: LazyReason) -> &AtomicU64 {
        match reason {
            LazyReason::KeysLimit => &self.keys_limit_groups,
            LazyReason::PostingsSize => &self.postings_size_groups,
        }
    }
}

impl LazyPostingsMetrics for LazyPostingsCounters {
    fn add_lazy_posting_bytes(&self, bytes: u64) {
        self.lazy_posting_size_bytes
            .fetch_add(bytes, Ordering::Relaxed);
    }

    fn inc_lazy_posting_groups(&self, reason: LazyReason) {
        self.counter(reason).fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_reason_labels() {
        let labels: Vec<String> = LazyReason::iter().map(|r| r.to_string()).collect();
        assert_eq!(labels, vec!["keys_limit", "postings_size"]);
        assert_eq!(LazyReason::PostingsSize.as_ref(), "postings_size");
    }

    #[test]
    fn test_counters() {
        let counters = LazyPostingsCounters::new();
        counters.add_lazy_posting_bytes(400);
        counters.add_lazy_posting_bytes(8);
        counters.inc_lazy_posting_groups(LazyReason::PostingsSize);
        counters.inc_lazy_posting_groups(LazyReason::PostingsSize);
        counters.inc_lazy_posting_groups(LazyReason::KeysLimit);

        assert_eq!(counters.lazy_posting_size_bytes(), 408);
        assert_eq!(counters.lazy_posting_groups(LazyReason::PostingsSize), 2);
        assert_eq!(counters.lazy_posting_groups(LazyReason::KeysLimit), 1);
    }
}
