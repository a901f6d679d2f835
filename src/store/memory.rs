//! In-process artifact store.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::core::artifact::{Fingerprint, PchArtifact};

use super::{ArtifactStore, StoreError};

/// Artifact store backed by a sharded concurrent map.
///
/// Used for single-invocation builds and in tests. Insert-if-absent goes
/// through the map's entry API, which locks only the key's shard.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<Fingerprint, PchArtifact>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }
}

impl ArtifactStore for MemoryStore {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<PchArtifact>, StoreError> {
        Ok(self.entries.get(fingerprint).map(|e| e.value().clone()))
    }

    fn put_if_absent(
        &self,
        fingerprint: &Fingerprint,
        artifact: &PchArtifact,
    ) -> Result<bool, StoreError> {
        match self.entries.entry(fingerprint.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(artifact.clone());
                Ok(true)
            }
        }
    }

    fn describe(&self) -> String {
        format!("memory store ({} entries)", self.entries.len())
    }
}
