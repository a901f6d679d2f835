//! Hashing utilities for checksums and fingerprinting.

use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

/// An incremental hasher for building digests from multiple components.
///
/// Every component is framed so that `["ab", "c"]` and `["a", "bc"]`
/// never collide.
#[derive(Default)]
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    /// Create a new hash builder.
    pub fn new() -> Self {
        HashBuilder {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0"); // Separator
        self
    }

    /// Add multiple strings.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add a raw byte component, prefixed with its length.
    pub fn update_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update((data.len() as u64).to_le_bytes());
        self.hasher.update(data);
        self
    }

    /// Add a domain tag separating sections of the digest.
    pub fn update_tag(&mut self, tag: u8) -> &mut Self {
        self.hasher.update([0xff, tag]);
        self
    }

    /// Add a count.
    pub fn update_u64(&mut self, n: u64) -> &mut Self {
        self.hasher.update(n.to_le_bytes());
        self
    }

    /// Finalize and return the digest as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}
