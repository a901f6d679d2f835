//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Replace a file's contents atomically, creating parent directories if needed.
///
/// Readers see either the old or the new contents, never a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(())
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the path as-is if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache").join("stats.json");

        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");

        write_atomic(&path, b"{\"pch_hits\":1}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"pch_hits\":1}");
    }

    #[test]
    fn test_remove_dir_all_if_exists() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("pch");
        fs::create_dir_all(dir.join("ab")).unwrap();

        remove_dir_all_if_exists(&dir).unwrap();
        assert!(!dir.exists());
        remove_dir_all_if_exists(&dir).unwrap();
    }
}
