//! Artifact reuse decisions.
//!
//! Content addressing makes the decision trivial: an artifact stored under
//! a unit's fingerprint was built from byte-identical inputs, so presence
//! alone means reusable. No timestamps are consulted.

use crate::core::artifact::Fingerprint;
use crate::core::outcome::Staleness;
use crate::store::{ArtifactStore, StoreError};

/// Read-only view of the artifact store.
pub struct StalenessOracle<'a> {
    store: &'a dyn ArtifactStore,
}

impl<'a> StalenessOracle<'a> {
    pub fn new(store: &'a dyn ArtifactStore) -> Self {
        StalenessOracle { store }
    }

    /// Look up `fingerprint`, returning the artifact if it can be reused.
    ///
    /// Store failures are returned so the caller can count them; use
    /// [`StalenessOracle::decide`] to fold them into a rebuild.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Result<Staleness, StoreError> {
        Ok(match self.store.get(fingerprint)? {
            Some(artifact) => Staleness::Fresh(artifact),
            None => Staleness::StaleRebuildNeeded,
        })
    }

    /// Like [`lookup`](Self::lookup), treating a store failure as a miss.
    pub fn decide(&self, fingerprint: &Fingerprint) -> Staleness {
        match self.lookup(fingerprint) {
            Ok(staleness) => staleness,
            Err(err) => {
                tracing::warn!(
                    "artifact lookup for {} failed, rebuilding: {}",
                    fingerprint.short(),
                    err
                );
                Staleness::StaleRebuildNeeded
            }
        }
    }

    pub fn is_reusable(&self, fingerprint: &Fingerprint) -> bool {
        self.decide(fingerprint).is_reusable()
    }
}
