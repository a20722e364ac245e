//! Core type definitions for stored resources.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Path segment separating a resource key from its version.
pub const HISTORY_SEGMENT: &str = "/_history/";

/// Permanent identifier of a resource: its type plus a logical id.
///
/// Rendered as `<Type>/<id>`, which is the relative reference form
/// used inside resource bodies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    resource_type: String,
    id: String,
}

impl ResourceKey {
    /// Creates a key from a type and id.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Mints a fresh key with a random UUID id.
    #[must_use]
    pub fn generate(resource_type: impl Into<String>) -> Self {
        Self::new(resource_type, Uuid::new_v4().to_string())
    }

    /// Parses a relative `<Type>/<id>` path.
    ///
    /// Returns `None` if the path does not have exactly two non-empty
    /// segments.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut parts = path.trim_matches('/').split('/');
        let resource_type = parts.next().filter(|s| !s.is_empty())?;
        let id = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(resource_type, id))
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Renders the version-qualified reference `<Type>/<id>/_history/<n>`.
    #[must_use]
    pub fn versioned(&self, version: VersionId) -> String {
        format!("{self}{HISTORY_SEGMENT}{}", version.as_u64())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// Monotonic version counter assigned by the store.
///
/// Versions start at 1 on create and increase by one on every update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VersionId(u64);

impl VersionId {
    /// The version assigned to a freshly created resource.
    pub const INITIAL: VersionId = VersionId(1);

    /// Creates a version id.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw version value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of write requested from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOp {
    /// Create a new resource of the given type under a store-minted id.
    Create {
        /// Resource type to create.
        resource_type: String,
    },
    /// Update (or create, if allowed) the resource with the given key.
    Update {
        /// Target resource.
        key: ResourceKey,
    },
}

impl PersistOp {
    /// Returns the resource type this operation writes.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match self {
            PersistOp::Create { resource_type } => resource_type,
            PersistOp::Update { key } => key.resource_type(),
        }
    }
}

/// A resource as persisted by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    /// Permanent identifier.
    pub key: ResourceKey,
    /// Version assigned by this write.
    pub version: VersionId,
    /// The body as stored, carrying `id` and `meta.versionId`.
    pub body: Value,
    /// Whether this write created the resource.
    pub created: bool,
}

impl StoredResource {
    /// Builds a stored resource, stamping identity metadata into the body.
    #[must_use]
    pub fn new(key: ResourceKey, version: VersionId, mut body: Value, created: bool) -> Self {
        if let Value::Object(map) = &mut body {
            map.insert("id".to_string(), Value::String(key.id().to_string()));
            let meta = map
                .entry("meta")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(meta) = meta {
                meta.insert(
                    "versionId".to_string(),
                    Value::String(version.to_string()),
                );
            }
        }
        Self {
            key,
            version,
            body,
            created,
        }
    }

    /// Renders the version-qualified reference to this resource.
    #[must_use]
    pub fn versioned_reference(&self) -> String {
        self.key.versioned(self.version)
    }
}

/// Checks that a body is acceptable for the given operation.
///
/// The body must be a JSON object whose `resourceType` matches the
/// operation; on update, an `id` in the body must match the target id.
pub fn validate_body(op: &PersistOp, body: &Value) -> crate::StorageResult<()> {
    let map = body
        .as_object()
        .ok_or_else(|| crate::StorageError::validation("resource must be a JSON object"))?;

    let declared = map
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| crate::StorageError::validation("missing resourceType"))?;

    if declared != op.resource_type() {
        return Err(crate::StorageError::validation(format!(
            "resourceType {declared} does not match {}",
            op.resource_type()
        )));
    }

    if let PersistOp::Update { key } = op {
        if let Some(body_id) = map.get("id").and_then(Value::as_str) {
            if body_id != key.id() {
                return Err(crate::StorageError::validation(format!(
                    "resource id {body_id} does not match {key}"
                )));
            }
        }
    }

    Ok(())
}
