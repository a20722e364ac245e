//! # clinitx Storage
//!
//! Resource store traits and implementations for clinitx.
//!
//! A store persists clinical resources as JSON bodies under permanent,
//! version-qualified identities. Stores differ in one load-bearing
//! capability: whether several writes can be grouped into one atomic
//! scope.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - Transactional, with optimistic conflict detection
//! - [`PartitionedStore`] - Per-type document partitions, no atomic scope
//!
//! ## Example
//!
//! ```rust
//! use clinitx_storage::{CapabilityDescriptor, InMemoryStore, PartitionedStore};
//!
//! assert!(InMemoryStore::new().supports_atomic_transactions());
//! assert!(!PartitionedStore::new().supports_atomic_transactions());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod partitioned;
mod types;

pub use backend::{CapabilityDescriptor, ResourceStore, StoreTransaction};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use partitioned::PartitionedStore;
pub use types::{
    validate_body, PersistOp, ResourceKey, StoredResource, VersionId, HISTORY_SEGMENT,
};
