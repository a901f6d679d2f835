//! On-disk content-addressed artifact store.
//!
//! Layout: `<root>/pch/<first two hex chars>/<fingerprint>.pch`. Each entry
//! starts with a fixed header:
//!
//! ```text
//! b"HPCH" | format version (u32 LE) | payload sha256 (64 ASCII hex) | payload
//! ```
//!
//! Entries are written to a temporary file in the destination directory and
//! published with a no-clobber link, so a reader either sees a complete entry
//! or nothing, and the first publisher for a key wins. A corrupted entry is
//! replaced by an atomic rename instead.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::core::artifact::{Fingerprint, PchArtifact};
use crate::util::fs::remove_dir_all_if_exists;

use super::{ArtifactStore, StoreError};

const ENTRY_MAGIC: [u8; 4] = *b"HPCH";

/// Bump on any change to the entry header or payload format.
const ENTRY_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 64;

const ENTRY_EXTENSION: &str = "pch";

/// Artifact store rooted at a cache directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

/// A stored entry, as listed by [`DiskStore::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub fingerprint: Fingerprint,
    pub size: u64,
}

impl DiskStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DiskStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join("pch")
    }

    /// Path of the entry for `fingerprint`.
    pub fn entry_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let key = fingerprint.as_str();
        self.entries_dir()
            .join(&key[..2])
            .join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    /// List all stored entries, skipping files that are not entries.
    pub fn entries(&self) -> Result<Vec<StoredEntry>> {
        let dir = self.entries_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(2).max_depth(2) {
            let entry =
                entry.with_context(|| format!("failed to walk cache: {}", dir.display()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(fingerprint) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<Fingerprint>().ok())
            else {
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            entries.push(StoredEntry { fingerprint, size });
        }

        entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        Ok(entries)
    }

    /// Total size of stored entries in bytes.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.entries()?.iter().map(|e| e.size).sum())
    }

    /// Remove every stored entry. Statistics are kept.
    pub fn clear(&self) -> Result<usize> {
        let count = self.entries()?.len();
        remove_dir_all_if_exists(&self.entries_dir())?;
        Ok(count)
    }

    fn encode(artifact: &PchArtifact) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + artifact.len());
        out.extend_from_slice(&ENTRY_MAGIC);
        out.extend_from_slice(&ENTRY_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(artifact.checksum().as_bytes());
        out.extend_from_slice(artifact.data());
        out
    }

    fn decode(fingerprint: &Fingerprint, bytes: &[u8]) -> Result<PchArtifact, StoreError> {
        let corrupted = |reason: &str| StoreError::Corrupted {
            fingerprint: fingerprint.clone(),
            reason: reason.to_string(),
        };

        if bytes.len() < HEADER_LEN {
            return Err(corrupted("truncated header"));
        }
        if bytes[..4] != ENTRY_MAGIC {
            return Err(corrupted("bad magic bytes"));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != ENTRY_FORMAT_VERSION {
            return Err(corrupted(&format!(
                "format version {} (expected {})",
                version, ENTRY_FORMAT_VERSION
            )));
        }

        let expected = std::str::from_utf8(&bytes[8..HEADER_LEN])
            .map_err(|_| corrupted("checksum is not ASCII"))?;
        let artifact = PchArtifact::new(bytes[HEADER_LEN..].to_vec());
        if artifact.checksum() != expected {
            return Err(corrupted("checksum mismatch"));
        }

        Ok(artifact)
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ArtifactStore for DiskStore {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<PchArtifact>, StoreError> {
        let path = self.entry_path(fingerprint);
        match fs::read(&path) {
            Ok(bytes) => Self::decode(fingerprint, &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn put_if_absent(
        &self,
        fingerprint: &Fingerprint,
        artifact: &PchArtifact,
    ) -> Result<bool, StoreError> {
        let path = self.entry_path(fingerprint);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.entries_dir());
        fs::create_dir_all(&dir).map_err(|e| Self::io_error(&dir, e))?;

        // A corrupted entry does not count as present.
        let corrupted = match self.get(fingerprint) {
            Ok(Some(_)) => return Ok(false),
            Ok(None) => false,
            Err(StoreError::Corrupted { reason, .. }) => {
                tracing::warn!(
                    "replacing corrupted cache entry {} ({})",
                    fingerprint.short(),
                    reason
                );
                true
            }
            Err(e) => return Err(e),
        };

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| Self::io_error(&dir, e))?;
        tmp.write_all(&Self::encode(artifact))
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Self::io_error(tmp.path(), e))?;

        if !corrupted {
            return match tmp.persist_noclobber(&path) {
                Ok(_) => Ok(true),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(Self::io_error(&path, e.error)),
            };
        }

        // Other writers may be replacing the same entry. The rename is
        // atomic, so whatever is stored afterwards is one complete entry;
        // ours only counts if it is the one read back.
        tmp.persist(&path)
            .map_err(|e| Self::io_error(&path, e.error))?;
        Ok(self
            .get(fingerprint)?
            .is_some_and(|stored| stored.checksum() == artifact.checksum()))
    }

    fn describe(&self) -> String {
        format!("disk store at {}", self.root.display())
    }
}
