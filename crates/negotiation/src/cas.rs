//! Optimistic read-modify-write over the durable store.
//!
//! Every aggregate is one JSON document under one key. A mutation reads the
//! document and its version, computes the replacement, and writes it only if
//! the version is unchanged. On a lost race the whole compute step runs again
//! against the fresh value, up to the configured number of attempts.

use durable_store::{DurableStore, StoreError, Version};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{NegotiationError, Result};

/// A stored document with invariants beyond what serde checks.
pub(crate) trait Stored: Serialize + DeserializeOwned {
    /// Describe the first broken invariant, if any.
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// What a compute step decided.
pub(crate) enum Mutation<T, R> {
    /// Write `T`, then return `R`.
    Write(T, R),
    /// Leave the stored value alone and return `R`.
    Keep(R),
}

/// Read and decode a document.
pub(crate) fn load<T: Stored>(store: &dyn DurableStore, key: &str) -> Result<Option<(T, Version)>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    let value: T = serde_json::from_slice(&raw.value).map_err(|err| corrupt(key, err.to_string()))?;
    value.check().map_err(|reason| corrupt(key, reason))?;

    Ok(Some((value, raw.version)))
}

/// Run a compare-and-swap loop on one key.
///
/// `compute` sees the current value (or `None`) and may be called several
/// times. Errors it returns abort the loop immediately.
pub(crate) fn mutate<T, R, F>(
    store: &dyn DurableStore,
    key: &str,
    max_attempts: u32,
    mut compute: F,
) -> Result<R>
where
    T: Stored,
    F: FnMut(Option<T>) -> Result<Mutation<T, R>>,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let (current, version) = match load::<T>(store, key)? {
            Some((value, version)) => (Some(value), Some(version)),
            None => (None, None),
        };

        let (next, output) = match compute(current)? {
            Mutation::Keep(output) => return Ok(output),
            Mutation::Write(next, output) => (next, output),
        };

        let bytes = serde_json::to_vec(&next).map_err(|source| NegotiationError::Encode {
            key: key.to_string(),
            source,
        })?;

        match store.set(key, &bytes, version) {
            Ok(_) => return Ok(output),
            Err(StoreError::Conflict { actual, .. }) => {
                debug!(key, attempt, ?version, ?actual, "Lost compare-and-swap, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(key, attempts = max_attempts, "Compare-and-swap retry budget exhausted");
    Err(NegotiationError::Conflict {
        key: key.to_string(),
        attempts: max_attempts,
    })
}

/// Fail unless a document's own id matches the id it was looked up by.
pub(crate) fn ensure_linked(key: &str, stored: &str, expected: &str) -> Result<()> {
    if stored != expected {
        return Err(corrupt(
            key,
            format!("belongs to {} instead of {}", stored, expected),
        ));
    }
    Ok(())
}

pub(crate) fn corrupt(key: &str, reason: impl Into<String>) -> NegotiationError {
    let reason = reason.into();
    warn!(key, reason = %reason, "Corrupt record in store");
    NegotiationError::CorruptState {
        key: key.to_string(),
        reason,
    }
}
