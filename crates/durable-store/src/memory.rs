//! In-process store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::{DurableStore, Version, Versioned};

/// A key slot. Deleted keys keep their version so it is never reused.
#[derive(Debug, Clone)]
struct Slot {
    value: Option<Vec<u8>>,
    version: Version,
}

/// Thread-safe in-memory store.
///
/// Behaves exactly like [`crate::SqliteStore`] with respect to versions and
/// conflicts, without touching the filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-deleted) keys.
    pub fn len(&self) -> Result<usize> {
        let slots = self.slots.lock().map_err(|_| StoreError::MutexPoisoned)?;
        Ok(slots.values().filter(|slot| slot.value.is_some()).count())
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Versioned>> {
        let slots = self.slots.lock().map_err(|_| StoreError::MutexPoisoned)?;
        Ok(slots.get(key).and_then(|slot| {
            slot.value.as_ref().map(|value| Versioned {
                value: value.clone(),
                version: slot.version,
            })
        }))
    }

    fn set(&self, key: &str, value: &[u8], expected: Option<Version>) -> Result<Version> {
        let mut slots = self.slots.lock().map_err(|_| StoreError::MutexPoisoned)?;

        let current = slots
            .get(key)
            .and_then(|slot| slot.value.as_ref().map(|_| slot.version));
        if current != expected {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected,
                actual: current,
            });
        }

        let version = match slots.get(key) {
            Some(slot) => slot.version.next(),
            None => Version::INITIAL,
        };
        slots.insert(
            key.to_string(),
            Slot {
                value: Some(value.to_vec()),
                version,
            },
        );

        Ok(version)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock().map_err(|_| StoreError::MutexPoisoned)?;
        if let Some(slot) = slots.get_mut(key) {
            if slot.value.take().is_some() {
                slot.version = slot.version.next();
            }
        }
        Ok(())
    }
}
