//! Fingerprints and compiled artifacts.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::util::hash::sha256_bytes;

/// Content-derived identity of a precompiled artifact's inputs.
///
/// A 64-character lowercase hex SHA-256 digest. Two units whose stable
/// prefixes and flags match byte-for-byte share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub(crate) fn from_hex(hex: String) -> Self {
        Fingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error parsing a fingerprint from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fingerprint `{0}`: expected 64 lowercase hex characters")]
pub struct InvalidFingerprint(pub String);

impl FromStr for Fingerprint {
    type Err = InvalidFingerprint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if valid {
            Ok(Fingerprint(s.to_string()))
        } else {
            Err(InvalidFingerprint(s.to_string()))
        }
    }
}

/// Compiled "boundary header plus everything before it".
///
/// Cheap to clone; the payload is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PchArtifact {
    data: Arc<[u8]>,
    checksum: String,
}

impl PchArtifact {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        let checksum = sha256_bytes(&data);
        PchArtifact {
            data: data.into(),
            checksum,
        }
    }

    /// Raw artifact bytes (e.g. a `.gch` file).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// SHA-256 of the payload.
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Output of compiling a unit's unstable part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectArtifact {
    /// Object file written by the compiler
    pub path: PathBuf,
}
