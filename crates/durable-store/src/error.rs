//! Store error types.

use thiserror::Error;

use crate::Version;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key was written by someone else since it was read.
    #[error("version conflict on {key}: expected {}, found {}", describe(.expected), describe(.actual))]
    Conflict {
        key: String,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// SQLite error (open, query, etc.)
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    MutexPoisoned,
}

fn describe(version: &Option<Version>) -> String {
    match version {
        Some(version) => version.to_string(),
        None => "absent".to_string(),
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_display() {
        let err = StoreError::Conflict {
            key: "threads/EST-000001".to_string(),
            expected: Some(Version::new(3)),
            actual: Some(Version::new(4)),
        };
        assert_eq!(
            err.to_string(),
            "version conflict on threads/EST-000001: expected v3, found v4"
        );

        let err = StoreError::Conflict {
            key: "k".to_string(),
            expected: None,
            actual: Some(Version::INITIAL),
        };
        assert_eq!(err.to_string(), "version conflict on k: expected absent, found v1");
    }
}
