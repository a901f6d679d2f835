//! Content-addressed storage for precompiled artifacts.
//!
//! The store is the only state shared between concurrently building units.
//! Entries are keyed by [`Fingerprint`] and never overwritten: the first
//! complete artifact published for a key is authoritative.

pub mod disk;
pub mod memory;
pub mod stats;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::artifact::{Fingerprint, PchArtifact};

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use stats::{CacheStatistics, StatsCounters};

/// Artifact store failure.
///
/// Lookup failures downgrade to a cache miss; only a failed write after a
/// rebuild is fatal to the unit.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupted entry for {fingerprint}: {reason}")]
    Corrupted {
        fingerprint: Fingerprint,
        reason: String,
    },

    #[error("store unreachable: {reason}")]
    Unreachable { reason: String },
}

/// Key-value map from fingerprint to artifact with atomic insert-if-absent.
///
/// Implementations must be safe for concurrent readers and writers, must
/// never expose a partially written artifact, and must not serialize
/// operations on unrelated keys behind a global lock.
pub trait ArtifactStore: Send + Sync {
    /// Fetch the artifact stored under `fingerprint`.
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<PchArtifact>, StoreError>;

    /// Store `artifact` unless the key already holds one.
    ///
    /// Returns `true` if this call's value is now the stored one.
    fn put_if_absent(
        &self,
        fingerprint: &Fingerprint,
        artifact: &PchArtifact,
    ) -> Result<bool, StoreError>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}
