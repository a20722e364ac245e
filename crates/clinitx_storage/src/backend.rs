//! Store trait definitions.

use crate::error::StorageResult;
use crate::types::{PersistOp, ResourceKey, StoredResource};
use serde_json::Value;

/// Static facts about what a store can do.
///
/// Capabilities are fixed when the store is configured and never change
/// during its lifetime. Querying them has no side effects and is safe
/// under arbitrary concurrency.
pub trait CapabilityDescriptor {
    /// Returns true if the store can run several writes as one atomic unit.
    fn supports_atomic_transactions(&self) -> bool;

    /// Short backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}

/// A resource store.
///
/// New backends plug in by implementing the capability query together
/// with the write and scope operations; callers select behavior from
/// [`CapabilityDescriptor::supports_atomic_transactions`] rather than from
/// the concrete backend type.
///
/// # Invariants
///
/// - A create assigns a fresh id and [`VersionId::INITIAL`](crate::VersionId::INITIAL)
/// - An update keeps the id and assigns the next version
/// - Writes made through a [`StoreTransaction`] are invisible to
///   [`ResourceStore::read`] until commit, and discarded on rollback
pub trait ResourceStore: CapabilityDescriptor + Send + Sync {
    /// Opens an atomic scope.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unsupported`](crate::StorageError::Unsupported)
    /// if the store has no atomic transactions.
    fn begin(&self) -> StorageResult<Box<dyn StoreTransaction + '_>>;

    /// Performs a single autocommitted write.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is rejected or the write conflicts.
    fn persist(&self, op: &PersistOp, body: Value) -> StorageResult<StoredResource>;

    /// Reads the latest committed version of a resource.
    ///
    /// # Errors
    ///
    /// Returns an error on an infrastructure fault; absence is `Ok(None)`.
    fn read(&self, key: &ResourceKey) -> StorageResult<Option<StoredResource>>;

    /// Returns the number of committed resources.
    fn len(&self) -> usize;

    /// Returns true if nothing has been committed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open atomic scope against a store.
///
/// Every scope must end in exactly one of [`commit`](Self::commit) or
/// [`rollback`](Self::rollback); both consume the scope.
pub trait StoreTransaction: Send {
    /// Stages a write and returns the identity it will have once committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is rejected or the target is missing.
    fn persist(&mut self, op: &PersistOp, body: Value) -> StorageResult<StoredResource>;

    /// Makes every staged write visible at once.
    ///
    /// # Errors
    ///
    /// Returns an error if a concurrent transaction committed a conflicting
    /// write first, in which case nothing from this scope is applied.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards every staged write.
    ///
    /// # Errors
    ///
    /// Returns an error on an infrastructure fault.
    fn rollback(self: Box<Self>) -> StorageResult<()>;

    /// Returns the number of staged writes.
    fn write_count(&self) -> usize;
}
