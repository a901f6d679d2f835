//! Test fixtures for common test scenarios.
//!
//! The `myapp` project: `another.h` is stable, `stable.h` is the boundary
//! and `unstable.h` is recompiled every time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::header::{HeaderRole, RoleMap};
use crate::core::unit::{BoundaryMarker, CompileFlags, IncludeDirective, TranslationUnit};

use super::MockIncludeScanner;

pub const ANOTHER_H: &str = "#pragma once\nvoid savetime();\n";
pub const STABLE_H: &str = "#pragma once\nvoid savemoretime();\n";
pub const UNSTABLE_H: &str = "#pragma once\nvoid notstable();\n";

pub const MYAPP_CPP: &str = r#"// MYAPP.CPP : Sample application
//             Precompiled code must be included before the boundary
//             header (stable.h). Unstable code comes after it.
//
#include "another.h"
#include "stable.h"
#include "unstable.h"

int main()
{
    savetime();
    savemoretime();
    notstable();
    return 0;
}
"#;

pub const MYAPP_MANIFEST: &str = r#"[pch]
boundary = "stable.h"
stable = ["another.h"]
unstable = ["unstable.h"]
flags = ["-std=c++17"]

[[unit]]
source = "myapp.cpp"
flags = ["-O2"]
"#;

/// Roles for the myapp headers.
pub fn myapp_roles() -> RoleMap {
    RoleMap::new()
        .with("another.h", HeaderRole::Stable)
        .with("unstable.h", HeaderRole::Unstable)
}

/// Scanner that knows the three myapp headers.
pub fn myapp_scanner() -> MockIncludeScanner {
    MockIncludeScanner::new()
        .with_header("another.h", ANOTHER_H)
        .with_header("stable.h", STABLE_H)
        .with_header("unstable.h", UNSTABLE_H)
}

/// A unit with myapp's include list and no flags.
pub fn myapp_unit(source: &str) -> TranslationUnit {
    TranslationUnit::new(
        source,
        vec![
            IncludeDirective::quoted("another.h"),
            IncludeDirective::quoted("stable.h"),
            IncludeDirective::quoted("unstable.h"),
        ],
        CompileFlags::default(),
        Arc::new(BoundaryMarker::new("stable.h")),
    )
}

/// Fixture for an on-disk PCH project.
#[derive(Debug, Clone)]
pub struct PchProjectFixture {
    /// Pch.toml content.
    pub manifest: String,
    /// Files (path relative to project root -> content).
    pub files: BTreeMap<PathBuf, String>,
}

impl PchProjectFixture {
    /// The myapp sample project.
    pub fn myapp() -> Self {
        PchProjectFixture {
            manifest: MYAPP_MANIFEST.to_string(),
            files: BTreeMap::new(),
        }
        .with_file("another.h", ANOTHER_H)
        .with_file("stable.h", STABLE_H)
        .with_file("unstable.h", UNSTABLE_H)
        .with_file("myapp.cpp", MYAPP_CPP)
    }

    /// Set the manifest content.
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Add or replace a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Write this fixture to a real directory.
    pub fn write_to(&self, root: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(root)?;
        std::fs::write(root.join("Pch.toml"), &self.manifest)?;

        for (rel_path, content) in &self.files {
            let full_path = root.join(rel_path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)?;
        }

        Ok(root.to_path_buf())
    }
}
