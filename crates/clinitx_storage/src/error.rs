//! Error types for store operations.

use crate::types::{ResourceKey, VersionId};
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The resource body was rejected by the store.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The resource to update does not exist.
    #[error("resource not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: ResourceKey,
    },

    /// The resource changed underneath this transaction.
    #[error("version conflict on {key}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        /// The contested resource.
        key: ResourceKey,
        /// The version this transaction based its write on (`None` for a create).
        expected: Option<VersionId>,
        /// The version currently committed (`None` if absent).
        actual: Option<VersionId>,
    },

    /// The backend cannot perform the requested operation.
    #[error("operation not supported by {backend}: {operation}")]
    Unsupported {
        /// Name of the backend.
        backend: &'static str,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The transaction is no longer active.
    #[error("transaction is not active")]
    TransactionInactive,

    /// Infrastructure fault inside the store.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the HTTP status code class for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::Validation(_) => 422,
            StorageError::NotFound { .. } => 404,
            StorageError::VersionConflict { .. } => 409,
            StorageError::Unsupported { .. } => 405,
            StorageError::TransactionInactive | StorageError::Internal(_) => 500,
        }
    }

    /// Returns true if the error stems from the submitted resource rather
    /// than the store itself.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
