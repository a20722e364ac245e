//! Error types for bundle processing.

use clinitx_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while processing a bundle.
///
/// Every variant describes the outcome of a whole bundle: when a
/// transaction fails, nothing it wrote is visible.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The store cannot run several writes as one atomic unit.
    #[error("transactions are not supported by the {backend} store")]
    UnsupportedOperation {
        /// Name of the store backend.
        backend: &'static str,
    },

    /// Two entries declare the same placeholder.
    #[error("duplicate placeholder {placeholder} at entry {index} (first declared at entry {first_index})")]
    DuplicatePlaceholder {
        /// The repeated placeholder.
        placeholder: String,
        /// Entry that declared it first.
        first_index: usize,
        /// Entry that repeated it.
        index: usize,
    },

    /// The store rejected one entry.
    #[error("entry {index} failed: {source}")]
    EntryPersistence {
        /// Position of the failing entry.
        index: usize,
        /// Placeholder of the failing entry, if it declared one.
        full_url: Option<String>,
        /// The store's reason.
        #[source]
        source: StorageError,
    },

    /// The store could not open, commit, or roll back the atomic scope.
    #[error("transaction scope failure: {source}")]
    Scope {
        /// The store's reason.
        #[source]
        source: StorageError,
    },

    /// The request was cancelled before the transaction committed.
    #[error("transaction cancelled before entry {index}")]
    Cancelled {
        /// Entry that would have been processed next.
        index: usize,
    },

    /// The request deadline passed before the transaction committed.
    #[error("transaction timed out before entry {index}")]
    TimedOut {
        /// Entry that would have been processed next.
        index: usize,
    },

    /// The bundle itself is malformed or not processable.
    #[error("invalid bundle: {message}")]
    InvalidBundle {
        /// Description of the problem.
        message: String,
    },

    /// The bundle could not be parsed or rendered.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid bundle error.
    pub fn invalid_bundle(message: impl Into<String>) -> Self {
        Self::InvalidBundle {
            message: message.into(),
        }
    }

    /// Wraps a store failure for the entry at `index`.
    pub fn entry(index: usize, full_url: Option<&str>, source: StorageError) -> Self {
        Self::EntryPersistence {
            index,
            full_url: full_url.map(str::to_string),
            source,
        }
    }

    /// Wraps a failure of the atomic scope itself.
    pub fn scope(source: StorageError) -> Self {
        Self::Scope { source }
    }

    /// Returns the HTTP status code reported for the whole request.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::UnsupportedOperation { .. } => 405,
            CoreError::DuplicatePlaceholder { .. }
            | CoreError::InvalidBundle { .. }
            | CoreError::Json(_) => 400,
            CoreError::EntryPersistence { source, .. } => source.status_code(),
            CoreError::Scope { source } => match source {
                StorageError::VersionConflict { .. } => 409,
                _ => 500,
            },
            CoreError::TimedOut { .. } => 408,
            CoreError::Cancelled { .. } => 499,
        }
    }

    /// Returns true if the request itself was at fault (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if the server was at fault (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Returns true if resubmitting the same bundle could succeed.
    ///
    /// Only commit races and request-lifetime interruptions qualify;
    /// capability rejection is permanent for a given store.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Scope {
                source: StorageError::VersionConflict { .. },
            }
            | CoreError::EntryPersistence {
                source: StorageError::VersionConflict { .. },
                ..
            }
            | CoreError::Cancelled { .. }
            | CoreError::TimedOut { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinitx_storage::ResourceKey;

    #[test]
    fn unsupported_is_method_not_allowed() {
        let err = CoreError::UnsupportedOperation {
            backend: "partitioned",
        };
        assert_eq!(err.status_code(), 405);
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn entry_failure_propagates_store_status() {
        let err = CoreError::entry(
            2,
            Some("urn:uuid:o1"),
            StorageError::NotFound {
                key: ResourceKey::new("Patient", "gone"),
            },
        );
        assert_eq!(err.status_code(), 404);
        let msg = err.to_string();
        assert!(msg.contains("entry 2"));
        assert!(msg.contains("Patient/gone"));
    }

    #[test]
    fn scope_failure_is_server_error() {
        let err = CoreError::scope(StorageError::internal("disk full"));
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn commit_conflict_is_retryable() {
        let err = CoreError::scope(StorageError::VersionConflict {
            key: ResourceKey::new("Patient", "p1"),
            expected: None,
            actual: None,
        });
        assert_eq!(err.status_code(), 409);
        assert!(err.is_retryable());
    }

    #[test]
    fn duplicate_placeholder_display() {
        let err = CoreError::DuplicatePlaceholder {
            placeholder: "urn:uuid:a".into(),
            first_index: 0,
            index: 3,
        };
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("urn:uuid:a"));
    }
}
