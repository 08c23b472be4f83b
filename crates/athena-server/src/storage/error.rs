//! Storage error types.

use thiserror::Error;

/// Failures from a [`Storage`](super::Storage) backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Underlying database or I/O failure
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A user with this name is already registered
    #[error("user {0} already exists")]
    AlreadyExists(String),
}
