//! Upload error types.

use thiserror::Error;

use crate::FileId;

/// Result type for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Upload errors.
///
/// Only [`UploadError::FileNotFound`] and [`UploadError::AlreadyRegistered`]
/// ever escape a batch; every other variant is reported per file.
#[derive(Debug, Error)]
pub enum UploadError {
    /// File identifier unknown to the file store.
    #[error("File not found: {0}")]
    FileNotFound(FileId),

    /// A live cancellation handle already exists for this file.
    #[error("Upload already in flight for file: {0}")]
    AlreadyRegistered(FileId),

    /// The transfer was aborted through its cancellation signal.
    #[error("Upload cancelled: {0}")]
    Cancelled(String),

    /// Storage backend error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// A conditional write predicate did not hold.
    #[error("Condition not met: {0}")]
    ConditionNotMet(String),

    /// Permission denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Upload too large.
    #[error("Upload too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed size.
        limit: u64,
    },

    /// Invalid object name.
    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    /// Timeout.
    #[error("Operation timed out")]
    Timeout,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Create a cancellation error for an object key.
    pub fn cancelled(key: impl Into<String>) -> Self {
        Self::Cancelled(key.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Check if this is the cancellation kind.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if this is a file store lookup failure.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }

    /// Check if this is a cancellation registry invariant violation.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::AlreadyRegistered(_))
    }

    /// Whether this error must abort the whole batch.
    pub fn is_fatal(&self) -> bool {
        self.is_lookup() || self.is_invariant_violation()
    }
}

impl From<blobdrop_config::ConfigError> for UploadError {
    fn from(err: blobdrop_config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(UploadError::cancelled("a.txt").is_cancelled());
        assert!(!UploadError::storage("boom").is_cancelled());

        let lookup = UploadError::FileNotFound(FileId::from("f1"));
        assert!(lookup.is_lookup());
        assert!(lookup.is_fatal());

        let dup = UploadError::AlreadyRegistered(FileId::from("f1"));
        assert!(dup.is_invariant_violation());
        assert!(dup.is_fatal());

        assert!(!UploadError::Timeout.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = UploadError::TooLarge { size: 10, limit: 5 };
        assert_eq!(
            err.to_string(),
            "Upload too large: 10 bytes exceeds limit of 5 bytes"
        );

        let err = UploadError::FileNotFound(FileId::from("photo-1"));
        assert_eq!(err.to_string(), "File not found: photo-1");
    }
}
