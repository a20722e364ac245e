//! Transactional in-memory resource store.

use crate::backend::{CapabilityDescriptor, ResourceStore, StoreTransaction};
use crate::error::{StorageError, StorageResult};
use crate::types::{validate_body, PersistOp, ResourceKey, StoredResource, VersionId};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory store with atomic multi-write transactions.
///
/// Transactions stage their writes privately and apply them in one step
/// at commit, under the store's write lock. Conflicts are detected
/// optimistically: the first transaction to commit a write to a resource
/// wins, and a later one whose writes were based on an older state fails
/// with [`StorageError::VersionConflict`] without applying anything.
///
/// # Example
///
/// ```rust
/// use clinitx_storage::{InMemoryStore, PersistOp, ResourceStore};
/// use serde_json::json;
///
/// let store = InMemoryStore::new();
/// let mut txn = store.begin().unwrap();
/// let patient = txn
///     .persist(
///         &PersistOp::Create { resource_type: "Patient".into() },
///         json!({"resourceType": "Patient"}),
///     )
///     .unwrap();
/// assert!(store.read(&patient.key).unwrap().is_none());
/// txn.commit().unwrap();
/// assert!(store.read(&patient.key).unwrap().is_some());
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    resources: RwLock<HashMap<ResourceKey, StoredResource>>,
    update_creates: bool,
    next_txid: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            update_creates: true,
            next_txid: AtomicU64::new(1),
        }
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether an update of a missing resource creates it.
    #[must_use]
    pub fn with_update_creates(mut self, value: bool) -> Self {
        self.update_creates = value;
        self
    }

    /// Returns every committed resource, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StoredResource> {
        let mut all: Vec<_> = self.resources.read().values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    fn committed_version(&self, key: &ResourceKey) -> Option<VersionId> {
        self.resources.read().get(key).map(|r| r.version)
    }
}

impl CapabilityDescriptor for InMemoryStore {
    fn supports_atomic_transactions(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl ResourceStore for InMemoryStore {
    fn begin(&self) -> StorageResult<Box<dyn StoreTransaction + '_>> {
        let txid = self.next_txid.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(txid, "memory transaction opened");
        Ok(Box::new(MemoryTransaction {
            store: self,
            txid,
            writes: Vec::new(),
            staged: HashMap::new(),
        }))
    }

    fn persist(&self, op: &PersistOp, body: Value) -> StorageResult<StoredResource> {
        let mut txn = self.begin()?;
        let stored = txn.persist(op, body)?;
        txn.commit()?;
        Ok(stored)
    }

    fn read(&self, key: &ResourceKey) -> StorageResult<Option<StoredResource>> {
        Ok(self.resources.read().get(key).cloned())
    }

    fn len(&self) -> usize {
        self.resources.read().len()
    }
}

/// A staged write together with the committed version it was based on.
#[derive(Debug)]
struct StagedWrite {
    base: Option<VersionId>,
    resource: StoredResource,
}

/// An open transaction against an [`InMemoryStore`].
///
/// Dropping it without commit discards the staged writes.
#[derive(Debug)]
struct MemoryTransaction<'a> {
    store: &'a InMemoryStore,
    txid: u64,
    /// Staged writes in the order they were made.
    writes: Vec<StagedWrite>,
    /// Key -> position in `writes`.
    staged: HashMap<ResourceKey, usize>,
}

impl MemoryTransaction<'_> {
    /// Returns the version this transaction currently sees for `key`,
    /// preferring its own staged writes.
    fn visible_version(&self, key: &ResourceKey) -> Option<VersionId> {
        match self.staged.get(key) {
            Some(&pos) => Some(self.writes[pos].resource.version),
            None => self.store.committed_version(key),
        }
    }

    fn stage(&mut self, base: Option<VersionId>, resource: StoredResource) {
        match self.staged.get(&resource.key) {
            Some(&pos) => {
                // Keep the original base so commit still checks against
                // the state this transaction first observed.
                self.writes[pos].resource = resource;
            }
            None => {
                self.staged.insert(resource.key.clone(), self.writes.len());
                self.writes.push(StagedWrite { base, resource });
            }
        }
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn persist(&mut self, op: &PersistOp, body: Value) -> StorageResult<StoredResource> {
        validate_body(op, &body)?;

        let (key, base, version, created) = match op {
            PersistOp::Create { resource_type } => {
                let key = ResourceKey::generate(resource_type.as_str());
                (key, None, VersionId::INITIAL, true)
            }
            PersistOp::Update { key } => match self.visible_version(key) {
                Some(current) => {
                    let base = if self.staged.contains_key(key) {
                        None
                    } else {
                        Some(current)
                    };
                    (key.clone(), base, current.next(), false)
                }
                None if self.store.update_creates => {
                    (key.clone(), None, VersionId::INITIAL, true)
                }
                None => return Err(StorageError::NotFound { key: key.clone() }),
            },
        };

        let stored = StoredResource::new(key, version, body, created);
        self.stage(base, stored.clone());
        Ok(stored)
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        let mut resources = this.store.resources.write();

        for write in &this.writes {
            let actual = resources.get(&write.resource.key).map(|r| r.version);
            if actual != write.base {
                tracing::debug!(
                    txid = this.txid,
                    key = %write.resource.key,
                    "memory transaction lost commit race"
                );
                return Err(StorageError::VersionConflict {
                    key: write.resource.key.clone(),
                    expected: write.base,
                    actual,
                });
            }
        }

        let count = this.writes.len();
        for write in this.writes {
            resources.insert(write.resource.key.clone(), write.resource);
        }
        tracing::trace!(txid = this.txid, writes = count, "memory transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        tracing::trace!(
            txid = self.txid,
            writes = self.writes.len(),
            "memory transaction rolled back"
        );
        Ok(())
    }

    fn write_count(&self) -> usize {
        self.writes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create(resource_type: &str) -> PersistOp {
        PersistOp::Create {
            resource_type: resource_type.into(),
        }
    }

    fn update(key: &ResourceKey) -> PersistOp {
        PersistOp::Update { key: key.clone() }
    }

    #[test]
    fn new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert!(store.supports_atomic_transactions());
    }

    #[test]
    fn create_assigns_initial_version() {
        let store = InMemoryStore::new();
        let stored = store
            .persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();
        assert_eq!(stored.version, VersionId::INITIAL);
        assert!(stored.created);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_increments_version() {
        let store = InMemoryStore::new();
        let first = store
            .persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();
        let second = store
            .persist(&update(&first.key), json!({"resourceType": "Patient"}))
            .unwrap();
        assert_eq!(second.key, first.key);
        assert_eq!(second.version, VersionId::new(2));
        assert!(!second.created);
    }

    #[test]
    fn update_of_missing_creates_when_allowed() {
        let store = InMemoryStore::new();
        let key = ResourceKey::new("Patient", "fixed");
        let stored = store
            .persist(&update(&key), json!({"resourceType": "Patient"}))
            .unwrap();
        assert_eq!(stored.key, key);
        assert_eq!(stored.version, VersionId::INITIAL);
        assert!(stored.created);
    }

    #[test]
    fn update_of_missing_fails_when_disallowed() {
        let store = InMemoryStore::new().with_update_creates(false);
        let key = ResourceKey::new("Patient", "fixed");
        let result = store.persist(&update(&key), json!({"resourceType": "Patient"}));
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn staged_writes_invisible_until_commit() {
        let store = InMemoryStore::new();
        let mut txn = store.begin().unwrap();
        let stored = txn
            .persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();
        assert_eq!(txn.write_count(), 1);
        assert!(store.read(&stored.key).unwrap().is_none());

        txn.commit().unwrap();
        assert_eq!(store.read(&stored.key).unwrap(), Some(stored));
    }

    #[test]
    fn rollback_discards_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.begin().unwrap();
        txn.persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();
        txn.rollback().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn drop_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut txn = store.begin().unwrap();
            txn.persist(&create("Patient"), json!({"resourceType": "Patient"}))
                .unwrap();
        }
        assert!(store.is_empty());
    }

    #[test]
    fn repeated_update_in_one_transaction() {
        let store = InMemoryStore::new();
        let base = store
            .persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();

        let mut txn = store.begin().unwrap();
        let v2 = txn
            .persist(&update(&base.key), json!({"resourceType": "Patient"}))
            .unwrap();
        let v3 = txn
            .persist(&update(&base.key), json!({"resourceType": "Patient"}))
            .unwrap();
        assert_eq!(v2.version, VersionId::new(2));
        assert_eq!(v3.version, VersionId::new(3));
        assert_eq!(txn.write_count(), 1);
        txn.commit().unwrap();

        let read = store.read(&base.key).unwrap().unwrap();
        assert_eq!(read.version, VersionId::new(3));
    }

    #[test]
    fn first_committer_wins() {
        let store = InMemoryStore::new();
        let base = store
            .persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();

        let mut a = store.begin().unwrap();
        let mut b = store.begin().unwrap();
        a.persist(&update(&base.key), json!({"resourceType": "Patient"}))
            .unwrap();
        b.persist(&update(&base.key), json!({"resourceType": "Patient"}))
            .unwrap();

        a.commit().unwrap();
        let result = b.commit();
        assert!(matches!(result, Err(StorageError::VersionConflict { .. })));
        assert_eq!(
            store.read(&base.key).unwrap().unwrap().version,
            VersionId::new(2)
        );
    }

    #[test]
    fn conflicting_commit_applies_nothing() {
        let store = InMemoryStore::new();
        let base = store
            .persist(&create("Patient"), json!({"resourceType": "Patient"}))
            .unwrap();

        let mut loser = store.begin().unwrap();
        let fresh = loser
            .persist(&create("Observation"), json!({"resourceType": "Observation"}))
            .unwrap();
        loser
            .persist(&update(&base.key), json!({"resourceType": "Patient"}))
            .unwrap();

        store
            .persist(&update(&base.key), json!({"resourceType": "Patient"}))
            .unwrap();

        assert!(loser.commit().is_err());
        assert!(store.read(&fresh.key).unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn validation_rejects_bad_body() {
        let store = InMemoryStore::new();
        let result = store.persist(&create("Patient"), json!({"resourceType": "Observation"}));
        assert!(matches!(result, Err(StorageError::Validation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_ordered() {
        let store = InMemoryStore::new();
        for id in ["b", "a", "c"] {
            store
                .persist(
                    &update(&ResourceKey::new("Patient", id)),
                    json!({"resourceType": "Patient"}),
                )
                .unwrap();
        }
        let ids: Vec<_> = store
            .snapshot()
            .iter()
            .map(|r| r.key.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
