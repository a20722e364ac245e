//! Non-transactional partitioned document store.

use crate::backend::{CapabilityDescriptor, ResourceStore, StoreTransaction};
use crate::error::{StorageError, StorageResult};
use crate::types::{validate_body, PersistOp, ResourceKey, StoredResource, VersionId};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// A document store that partitions resources by type.
///
/// Each partition is locked independently, so a write is atomic only
/// within its own document. There is no scope spanning several writes:
/// [`ResourceStore::begin`] always fails with
/// [`StorageError::Unsupported`].
#[derive(Debug)]
pub struct PartitionedStore {
    partitions: RwLock<HashMap<String, RwLock<HashMap<String, StoredResource>>>>,
    update_creates: bool,
}

impl Default for PartitionedStore {
    fn default() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            update_creates: true,
        }
    }
}

impl PartitionedStore {
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

    /// Returns the number of partitions that hold at least one document.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions
            .read()
            .values()
            .filter(|p| !p.read().is_empty())
            .count()
    }

    fn ensure_partition(&self, resource_type: &str) {
        if self.partitions.read().contains_key(resource_type) {
            return;
        }
        self.partitions
            .write()
            .entry(resource_type.to_string())
            .or_default();
    }
}

impl CapabilityDescriptor for PartitionedStore {
    fn supports_atomic_transactions(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "partitioned"
    }
}

impl ResourceStore for PartitionedStore {
    fn begin(&self) -> StorageResult<Box<dyn StoreTransaction + '_>> {
        Err(StorageError::Unsupported {
            backend: self.backend_name(),
            operation: "atomic transaction",
        })
    }

    fn persist(&self, op: &PersistOp, body: Value) -> StorageResult<StoredResource> {
        validate_body(op, &body)?;
        self.ensure_partition(op.resource_type());

        let partitions = self.partitions.read();
        let mut partition = partitions
            .get(op.resource_type())
            .ok_or_else(|| StorageError::internal("partition vanished"))?
            .write();

        let stored = match op {
            PersistOp::Create { resource_type } => {
                let key = ResourceKey::generate(resource_type.as_str());
                StoredResource::new(key, VersionId::INITIAL, body, true)
            }
            PersistOp::Update { key } => match partition.get(key.id()) {
                Some(current) => StoredResource::new(key.clone(), current.version.next(), body, false),
                None if self.update_creates => {
                    StoredResource::new(key.clone(), VersionId::INITIAL, body, true)
                }
                None => return Err(StorageError::NotFound { key: key.clone() }),
            },
        };

        partition.insert(stored.key.id().to_string(), stored.clone());
        Ok(stored)
    }

    fn read(&self, key: &ResourceKey) -> StorageResult<Option<StoredResource>> {
        Ok(self
            .partitions
            .read()
            .get(key.resource_type())
            .and_then(|p| p.read().get(key.id()).cloned()))
    }

    fn len(&self) -> usize {
        self.partitions.read().values().map(|p| p.read().len()).sum()
    }
}
