//! Store error types
//!
//! Defines all errors that can occur in the room and document store.

use thiserror::Error;

use super::types::RoomId;

/// Errors that can occur in the room store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation failed (creating the data directory, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested room does not exist
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// Could not allocate a fresh room id
    #[error("Room id space exhausted after {0} attempts")]
    IdExhausted(usize),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Blocking task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::RoomNotFound("ghost".to_string());
        assert_eq!(err.to_string(), "Room not found: ghost");

        let err = StoreError::IdExhausted(5);
        assert_eq!(err.to_string(), "Room id space exhausted after 5 attempts");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}
