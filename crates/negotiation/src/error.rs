//! Error types for negotiation operations.

use durable_store::StoreError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors surfaced by negotiation operations.
#[derive(Debug, Error)]
pub enum NegotiationError {
    /// Malformed input. Never retried.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The operation needs a record that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Another writer kept winning the compare-and-swap.
    #[error("write to {key} conflicted {attempts} times, please retry")]
    Conflict { key: String, attempts: u32 },

    /// A stored record failed schema validation.
    #[error("stored record {key} is corrupt: {reason}")]
    CorruptState { key: String, reason: String },

    /// A record could not be serialized.
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The durable store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl NegotiationError {
    /// Whether re-running the whole user action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NegotiationError::Conflict { .. })
    }

    /// Key of the corrupt record, if this is a corrupt-state error.
    pub fn corrupt_key(&self) -> Option<&str> {
        match self {
            NegotiationError::CorruptState { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result type for negotiation operations.
pub type Result<T> = std::result::Result<T, NegotiationError>;
