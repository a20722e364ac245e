//! Bundle processing statistics.
//!
//! # Usage
//!
//! ```rust
//! use clinitx_core::{Bundle, BundleProcessor, Config, RequestContext};
//! use clinitx_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let processor = BundleProcessor::new(Arc::new(InMemoryStore::new()), Config::default());
//! processor
//!     .process(&Bundle::transaction(vec![]), &RequestContext::new())
//!     .unwrap();
//!
//! let stats = processor.stats().snapshot();
//! assert_eq!(stats.transactions_committed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for processed bundles.
///
/// All counters are atomic and can be read while bundles are in flight.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    transactions_committed: AtomicU64,
    transactions_aborted: AtomicU64,
    transactions_rejected: AtomicU64,
    batches_processed: AtomicU64,
    entries_written: AtomicU64,
    entries_failed: AtomicU64,
}

impl ProcessorStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_commit(&self, entries: usize) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
        self.entries_written
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.transactions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, written: usize, failed: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.entries_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.entries_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted: self.transactions_aborted.load(Ordering::Relaxed),
            transactions_rejected: self.transactions_rejected.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
            entries_failed: self.entries_failed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`ProcessorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Transactions that committed.
    pub transactions_committed: u64,
    /// Transactions that opened a scope and then rolled back.
    pub transactions_aborted: u64,
    /// Transactions refused before touching the store.
    pub transactions_rejected: u64,
    /// Batch bundles processed.
    pub batches_processed: u64,
    /// Entries durably written.
    pub entries_written: u64,
    /// Batch entries that failed.
    pub entries_failed: u64,
}
