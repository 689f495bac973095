//! Error types for the memoization layer
//!
//! Provides unified error handling using thiserror. None of these errors reach
//! the caller of a memoized task: they are logged where they occur and the cache
//! falls back to a safe state.

use thiserror::Error;

// == Storage Error ==
/// Failure reported by a [`Storage`](crate::persist::Storage) backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Write would exceed the backend's byte quota
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Underlying I/O failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// == Codec Error ==
/// Failure to encode or decode a cached payload.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

// == Memo Error Enum ==
/// Unified error type for cache management.
#[derive(Error, Debug)]
pub enum MemoError {
    /// Call arguments cannot be turned into a cache key
    #[error("Arguments are not cacheable")]
    UncacheableArguments,

    /// Persist identifier is empty or malformed
    #[error("Invalid persist identifier: {0:?}")]
    InvalidPersistIdentifier(String),

    /// Persist identifier is already claimed by another handler
    #[error("Duplicate persist identifier: {0}")]
    DuplicatePersistIdentifier(String),

    /// Stored snapshot could not be parsed
    #[error("Corrupt persisted snapshot in slot {slot}: {source}")]
    CorruptSnapshot {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be read from or written to storage
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Payload could not be serialized or deserialized
    #[error("Codec failure: {0}")]
    Codec(#[from] CodecError),
}

// == Result Type Alias ==
/// Convenience Result type for cache management.
pub type Result<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MemoError::DuplicatePersistIdentifier("users".to_string());
        assert_eq!(err.to_string(), "Duplicate persist identifier: users");

        let err = MemoError::InvalidPersistIdentifier("".to_string());
        assert_eq!(err.to_string(), "Invalid persist identifier: \"\"");
    }

    #[test]
    fn test_storage_error_converts() {
        let err: MemoError = StorageError::QuotaExceeded {
            needed: 10,
            quota: 4,
        }
        .into();
        assert!(matches!(
            err,
            MemoError::Storage(StorageError::QuotaExceeded { .. })
        ));
    }
}
