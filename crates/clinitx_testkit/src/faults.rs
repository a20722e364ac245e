//! Instrumented stores for fault injection and call accounting.
//!
//! [`InstrumentedStore`] wraps any [`ResourceStore`], counts every call
//! made to it, and can be told to fail the k-th write or the commit.

use clinitx_storage::{
    CapabilityDescriptor, PersistOp, ResourceKey, ResourceStore, StorageError, StorageResult,
    StoreTransaction, StoredResource,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Message carried by injected failures.
pub const INJECTED_FAILURE: &str = "injected failure";

/// Counts of calls made to an [`InstrumentedStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Scopes opened.
    pub begins: usize,
    /// Writes attempted, autocommitted or staged.
    pub persists: usize,
    /// Reads.
    pub reads: usize,
    /// Commits attempted.
    pub commits: usize,
    /// Rollbacks.
    pub rollbacks: usize,
}

impl CallCounts {
    /// Total number of calls that reach the wrapped store's data.
    #[must_use]
    pub fn data_calls(&self) -> usize {
        self.begins + self.persists + self.reads + self.commits + self.rollbacks
    }
}

#[derive(Debug, Default)]
struct Counters {
    begins: AtomicUsize,
    persists: AtomicUsize,
    reads: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    capability_queries: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// A store wrapper that records calls and injects failures.
#[derive(Debug)]
pub struct InstrumentedStore<S> {
    inner: S,
    fail_on_persist: Option<usize>,
    fail_on_commit: bool,
    counters: Counters,
}

impl<S: ResourceStore> InstrumentedStore<S> {
    /// Wraps `inner` without injecting failures.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_on_persist: None,
            fail_on_commit: false,
            counters: Counters::default(),
        }
    }

    /// Makes the write with zero-based position `k` fail, counting every
    /// write this store sees.
    #[must_use]
    pub fn fail_on_persist(mut self, k: usize) -> Self {
        self.fail_on_persist = Some(k);
        self
    }

    /// Makes every commit fail. The wrapped scope is rolled back first, so
    /// none of its writes become visible.
    #[must_use]
    pub fn fail_on_commit(mut self) -> Self {
        self.fail_on_commit = true;
        self
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns how often each operation was called so far.
    pub fn counts(&self) -> CallCounts {
        CallCounts {
            begins: self.counters.begins.load(Ordering::SeqCst),
            persists: self.counters.persists.load(Ordering::SeqCst),
            reads: self.counters.reads.load(Ordering::SeqCst),
            commits: self.counters.commits.load(Ordering::SeqCst),
            rollbacks: self.counters.rollbacks.load(Ordering::SeqCst),
        }
    }

    /// Returns how often the capability was queried.
    pub fn capability_queries(&self) -> usize {
        self.counters.capability_queries.load(Ordering::SeqCst)
    }

    fn check_injected(&self) -> StorageResult<()> {
        let position = Counters::bump(&self.counters.persists);
        if self.fail_on_persist == Some(position) {
            return Err(StorageError::internal(INJECTED_FAILURE));
        }
        Ok(())
    }
}

impl<S: ResourceStore> CapabilityDescriptor for InstrumentedStore<S> {
    fn supports_atomic_transactions(&self) -> bool {
        Counters::bump(&self.counters.capability_queries);
        self.inner.supports_atomic_transactions()
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

impl<S: ResourceStore> ResourceStore for InstrumentedStore<S> {
    fn begin(&self) -> StorageResult<Box<dyn StoreTransaction + '_>> {
        Counters::bump(&self.counters.begins);
        let inner = self.inner.begin()?;
        Ok(Box::new(InstrumentedTransaction { inner, store: self }))
    }

    fn persist(&self, op: &PersistOp, body: Value) -> StorageResult<StoredResource> {
        self.check_injected()?;
        self.inner.persist(op, body)
    }

    fn read(&self, key: &ResourceKey) -> StorageResult<Option<StoredResource>> {
        Counters::bump(&self.counters.reads);
        self.inner.read(key)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

struct InstrumentedTransaction<'a, S> {
    inner: Box<dyn StoreTransaction + 'a>,
    store: &'a InstrumentedStore<S>,
}

impl<S: ResourceStore> StoreTransaction for InstrumentedTransaction<'_, S> {
    fn persist(&mut self, op: &PersistOp, body: Value) -> StorageResult<StoredResource> {
        self.store.check_injected()?;
        self.inner.persist(op, body)
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        Counters::bump(&self.store.counters.commits);
        if self.store.fail_on_commit {
            self.inner.rollback()?;
            return Err(StorageError::internal(INJECTED_FAILURE));
        }
        self.inner.commit()
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        Counters::bump(&self.store.counters.rollbacks);
        self.inner.rollback()
    }

    fn write_count(&self) -> usize {
        self.inner.write_count()
    }
}
