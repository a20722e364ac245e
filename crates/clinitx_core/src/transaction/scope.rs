//! Atomic scope guard.

use crate::error::{CoreError, CoreResult};
use clinitx_storage::{PersistOp, ResourceStore, StorageError, StoreTransaction, StoredResource};
use serde_json::Value;

/// State of an atomic scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// The scope is open and accepts writes.
    Active,
    /// The scope has been committed.
    Committed,
    /// The scope has been rolled back.
    Aborted,
}

/// An open atomic scope against a store.
///
/// The scope ends in exactly one of [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). If it is dropped while still active,
/// for example when an error is propagated with `?` or the thread
/// unwinds, it rolls back.
pub struct TransactionScope<'a> {
    inner: Option<Box<dyn StoreTransaction + 'a>>,
    state: ScopeState,
}

impl<'a> TransactionScope<'a> {
    /// Opens a scope against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Scope`] if the store cannot open one.
    pub fn begin(store: &'a dyn ResourceStore) -> CoreResult<Self> {
        let inner = store.begin().map_err(CoreError::scope)?;
        Ok(Self {
            inner: Some(inner),
            state: ScopeState::Active,
        })
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Checks if the scope is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ScopeState::Active
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |txn| txn.write_count())
    }

    /// Stages one write.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged; wrapping it with the entry
    /// position is up to the caller.
    pub fn persist(&mut self, op: &PersistOp, body: Value) -> Result<StoredResource, StorageError> {
        match self.inner.as_mut() {
            Some(txn) => txn.persist(op, body),
            None => Err(StorageError::TransactionInactive),
        }
    }

    /// Commits every staged write.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Scope`] if the scope is not active or the store
    /// refuses the commit. Either way nothing from this scope is visible.
    pub fn commit(&mut self) -> CoreResult<()> {
        let txn = self.take_active()?;
        match txn.commit() {
            Ok(()) => {
                self.state = ScopeState::Committed;
                Ok(())
            }
            Err(err) => {
                self.state = ScopeState::Aborted;
                Err(CoreError::scope(err))
            }
        }
    }

    /// Discards every staged write.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Scope`] if the scope is not active or the store
    /// fails to roll back.
    pub fn rollback(&mut self) -> CoreResult<()> {
        let txn = self.take_active()?;
        self.state = ScopeState::Aborted;
        txn.rollback().map_err(CoreError::scope)
    }

    fn take_active(&mut self) -> CoreResult<Box<dyn StoreTransaction + 'a>> {
        match (self.state, self.inner.take()) {
            (ScopeState::Active, Some(txn)) => Ok(txn),
            (ScopeState::Committed, _) => Err(CoreError::scope(StorageError::internal(
                "scope already committed",
            ))),
            _ => Err(CoreError::scope(StorageError::TransactionInactive)),
        }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if let Some(txn) = self.inner.take() {
            let writes = txn.write_count();
            if let Err(err) = txn.rollback() {
                tracing::error!(error = %err, writes, "rollback of abandoned scope failed");
            } else {
                tracing::debug!(writes, "abandoned scope rolled back");
            }
        }
    }
}

impl std::fmt::Debug for TransactionScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("state", &self.state)
            .field("write_count", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinitx_storage::{InMemoryStore, PartitionedStore};
    use serde_json::json;

    fn create_patient() -> (PersistOp, Value) {
        (
            PersistOp::Create {
                resource_type: "Patient".into(),
            },
            json!({"resourceType": "Patient"}),
        )
    }

    #[test]
    fn new_scope_is_active() {
        let store = InMemoryStore::new();
        let scope = TransactionScope::begin(&store).unwrap();
        assert!(scope.is_active());
        assert_eq!(scope.state(), ScopeState::Active);
    }

    #[test]
    fn begin_on_non_transactional_store_fails() {
        let store = PartitionedStore::new();
        let result = TransactionScope::begin(&store);
        assert!(matches!(result, Err(CoreError::Scope { .. })));
    }

    #[test]
    fn commit_makes_writes_visible() {
        let store = InMemoryStore::new();
        let mut scope = TransactionScope::begin(&store).unwrap();
        let (op, body) = create_patient();
        let stored = scope.persist(&op, body).unwrap();
        assert_eq!(scope.write_count(), 1);

        scope.commit().unwrap();
        assert_eq!(scope.state(), ScopeState::Committed);
        assert!(store.read(&stored.key).unwrap().is_some());
    }

    #[test]
    fn rollback_discards_writes() {
        let store = InMemoryStore::new();
        let mut scope = TransactionScope::begin(&store).unwrap();
        let (op, body) = create_patient();
        scope.persist(&op, body).unwrap();

        scope.rollback().unwrap();
        assert_eq!(scope.state(), ScopeState::Aborted);
        assert!(store.is_empty());
    }

    #[test]
    fn drop_rolls_back() {
        let store = InMemoryStore::new();
        {
            let mut scope = TransactionScope::begin(&store).unwrap();
            let (op, body) = create_patient();
            scope.persist(&op, body).unwrap();
        }
        assert!(store.is_empty());
    }

    #[test]
    fn cannot_write_after_commit() {
        let store = InMemoryStore::new();
        let mut scope = TransactionScope::begin(&store).unwrap();
        scope.commit().unwrap();

        let (op, body) = create_patient();
        assert!(matches!(
            scope.persist(&op, body),
            Err(StorageError::TransactionInactive)
        ));
    }

    #[test]
    fn cannot_commit_twice() {
        let store = InMemoryStore::new();
        let mut scope = TransactionScope::begin(&store).unwrap();
        scope.commit().unwrap();
        assert!(scope.commit().is_err());
        assert!(scope.rollback().is_err());
    }
}
