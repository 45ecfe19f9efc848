//! Versioned key-value persistence layer for Quote Desk.
//!
//! This crate provides the durable substrate shared by the customer and
//! administrator sessions. Every key carries a monotonic version, and writes
//! are conditional on the version the writer last observed, so two processes
//! working on the same file cannot silently overwrite each other.
//!
//! Two implementations are provided:
//!
//! - [`SqliteStore`] - a single `kv` table in a SQLite file, safe to open from
//!   several processes at once
//! - [`MemoryStore`] - an in-process map, used by tests and tooling
//!
//! # Example
//!
//! ```no_run
//! use durable_store::{DurableStore, SqliteStore, StoreError};
//!
//! fn main() -> Result<(), StoreError> {
//!     let store = SqliteStore::open("quote-desk.db")?;
//!
//!     // Create: the key must not exist yet
//!     let v1 = store.set("greeting", b"hello", None)?;
//!
//!     // Update: only succeeds if nobody wrote in between
//!     let v2 = store.set("greeting", b"hello again", Some(v1))?;
//!
//!     // A stale writer is rejected
//!     let stale = store.set("greeting", b"lost update", Some(v1));
//!     assert!(matches!(stale, Err(StoreError::Conflict { .. })));
//!
//!     let current = store.get("greeting")?.expect("value present");
//!     assert_eq!(current.version, v2);
//!     Ok(())
//! }
//! ```

pub mod error;
mod memory;
mod sqlite;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::fmt;

/// Version of a stored value.
///
/// Versions start at [`Version::INITIAL`] and grow by one on every
/// successful write or delete of the key. They are never reused for a key,
/// even after the key has been deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    /// Version assigned to the first write of a key.
    pub const INITIAL: Version = Version(1);

    /// Wrap a raw version number.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw version number.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The version that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A stored value together with the version it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// Raw bytes as written.
    pub value: Vec<u8>,
    /// Version of this value.
    pub version: Version,
}

/// Opaque, version-aware key-value store.
///
/// The store has no multi-key transactions and no locks. Callers build
/// atomic read-modify-write cycles on top of [`DurableStore::set`] by
/// passing the version they read and retrying on [`StoreError::Conflict`].
pub trait DurableStore: Send + Sync {
    /// Read the current value of a key, or `None` if it is absent.
    fn get(&self, key: &str) -> Result<Option<Versioned>>;

    /// Write a value if the key is still at `expected`.
    ///
    /// `expected = None` means the key must currently be absent. Returns the
    /// new version on success and [`StoreError::Conflict`] if another writer
    /// got there first.
    fn set(&self, key: &str, value: &[u8], expected: Option<Version>) -> Result<Version>;

    /// Remove a key. Deleting an absent key is a no-op.
    fn delete(&self, key: &str) -> Result<()>;
}
