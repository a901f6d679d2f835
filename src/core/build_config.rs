//! Project configuration (`Pch.toml`).
//!
//! ```toml
//! [pch]
//! boundary = "stable.h"
//! stable = ["another.h"]
//! unstable = ["unstable.h"]
//! include_dirs = ["include"]
//! flags = ["-std=c++17"]
//! language = "c++"
//!
//! [[unit]]
//! source = "myapp.cpp"
//! flags = ["-O2"]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::builder::compiler::Language;
use crate::builder::scanner::FsIncludeScanner;
use crate::core::header::{HeaderRole, RoleMap};
use crate::core::unit::{BoundaryMarker, CompileFlags, TranslationUnit};

/// Project configuration file name.
pub const MANIFEST_NAME: &str = "Pch.toml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `Pch.toml` in `{}` or any parent directory", .dir.display())]
    NotFound { dir: PathBuf },
}

/// Find `Pch.toml` in `start` or the nearest ancestor that has one.
pub fn find_manifest(start: &Path) -> Result<PathBuf, ManifestError> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_NAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ManifestError::NotFound {
            dir: start.to_path_buf(),
        })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    pch: RawPch,
    #[serde(default, rename = "unit")]
    units: Vec<RawUnit>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPch {
    boundary: String,
    #[serde(default)]
    stable: Vec<String>,
    #[serde(default)]
    unstable: Vec<String>,
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
    #[serde(default)]
    flags: Vec<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUnit {
    source: PathBuf,
    #[serde(default)]
    flags: Vec<String>,
    output: Option<PathBuf>,
}

/// One `[[unit]]` entry, with paths made absolute and flags merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub source: PathBuf,
    pub flags: CompileFlags,
    pub output: Option<PathBuf>,
}

/// Loaded project configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    root: PathBuf,
    boundary: Arc<BoundaryMarker>,
    roles: RoleMap,
    include_dirs: Vec<PathBuf>,
    flags: CompileFlags,
    language: Option<Language>,
    units: Vec<UnitSpec>,
}

impl BuildConfig {
    /// Load a project configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse configuration content; relative paths are taken from the
    /// manifest's directory.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let root = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let boundary_name = raw.pch.boundary.trim();
        if boundary_name.is_empty() {
            bail!("`pch.boundary` in {} must name a header", path.display());
        }

        let mut roles = RoleMap::new();
        for (names, role) in [
            (&raw.pch.stable, HeaderRole::Stable),
            (&raw.pch.unstable, HeaderRole::Unstable),
        ] {
            for name in names {
                if name == boundary_name {
                    bail!(
                        "`{}` is the boundary header and cannot also be listed as {}",
                        name,
                        role
                    );
                }
                if let Some((_, existing)) = roles.iter().find(|(pattern, _)| *pattern == name.as_str()) {
                    bail!("header `{}` is listed as both {} and {}", name, existing, role);
                }
                roles.insert(name.clone(), role);
            }
        }

        let include_dirs = raw
            .pch
            .include_dirs
            .iter()
            .map(|dir| root.join(dir))
            .collect();
        let flags = CompileFlags::new(raw.pch.flags);
        let language = match raw.pch.language.as_deref() {
            None => None,
            Some("c") => Some(Language::C),
            Some("c++" | "cxx" | "cpp") => Some(Language::Cxx),
            Some(other) => bail!(
                "unknown `pch.language` `{}` in {} (expected `c` or `c++`)",
                other,
                path.display()
            ),
        };

        let units: Vec<UnitSpec> = raw
            .units
            .into_iter()
            .map(|unit| {
                let mut unit_flags = flags.clone();
                unit_flags.extend(unit.flags);
                UnitSpec {
                    source: root.join(unit.source),
                    flags: unit_flags,
                    output: unit.output.map(|o| root.join(o)),
                }
            })
            .collect();

        if units.is_empty() {
            tracing::warn!("{} declares no `[[unit]]` entries", path.display());
        }

        Ok(BuildConfig {
            root,
            boundary: Arc::new(BoundaryMarker::new(boundary_name)),
            roles,
            include_dirs,
            flags,
            language,
            units,
        })
    }

    /// Directory containing the manifest.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn boundary(&self) -> &Arc<BoundaryMarker> {
        &self.boundary
    }

    pub fn roles(&self) -> &RoleMap {
        &self.roles
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Flags applied to every unit.
    pub fn flags(&self) -> &CompileFlags {
        &self.flags
    }

    /// Language for the precompiled prefix when no `-std=` flag decides it.
    pub fn language(&self) -> Option<Language> {
        self.language
    }

    pub fn units(&self) -> &[UnitSpec] {
        &self.units
    }

    /// Filesystem scanner over this project's include directories.
    pub fn scanner(&self) -> FsIncludeScanner {
        FsIncludeScanner::new(self.include_dirs.clone())
    }

    /// Read each unit's source and build its translation unit.
    pub fn translation_units(&self) -> Result<Vec<TranslationUnit>> {
        let scanner = self.scanner();
        self.units
            .iter()
            .map(|entry| {
                let includes = scanner
                    .scan_file(&entry.source)
                    .with_context(|| format!("failed to scan unit {}", entry.source.display()))?;
                let unit = TranslationUnit::new(
                    entry.source.clone(),
                    includes,
                    entry.flags.clone(),
                    Arc::clone(&self.boundary),
                );
                Ok(match &entry.output {
                    Some(output) => unit.with_output(output),
                    None => unit,
                })
            })
            .collect()
    }
}
