//! Translation units and the boundary marker.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::header::HeaderId;

/// The header that splits stable from unstable includes for a whole build.
///
/// Set once per build invocation and shared read-only by every unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryMarker(String);

impl BoundaryMarker {
    pub fn new(name: impl AsRef<str>) -> Self {
        BoundaryMarker(name.as_ref().replace('\\', "/"))
    }

    /// The configured boundary name, e.g. `stable.h`.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Check whether a resolved header is the boundary.
    pub fn is(&self, header: &HeaderId) -> bool {
        header.matches(&self.0)
    }
}

impl fmt::Display for BoundaryMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity of a translation unit within one build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        UnitId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an include was spelled in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeKind {
    /// `#include "header.h"`
    Quoted,
    /// `#include <header.h>`
    Angled,
}

/// A literal `#include` directive, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeDirective {
    pub path: String,
    pub kind: IncludeKind,
}

impl IncludeDirective {
    pub fn quoted(path: impl Into<String>) -> Self {
        IncludeDirective {
            path: path.into(),
            kind: IncludeKind::Quoted,
        }
    }

    pub fn angled(path: impl Into<String>) -> Self {
        IncludeDirective {
            path: path.into(),
            kind: IncludeKind::Angled,
        }
    }
}

impl fmt::Display for IncludeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IncludeKind::Quoted => write!(f, "\"{}\"", self.path),
            IncludeKind::Angled => write!(f, "<{}>", self.path),
        }
    }
}

/// Compile flags for a unit, in command-line order.
///
/// The compiler receives flags in the order given; fingerprinting uses
/// [`CompileFlags::canonical`] so that flag order never affects reuse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileFlags(Vec<String>);

impl CompileFlags {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CompileFlags(flags.into_iter().map(Into::into).collect())
    }

    /// Append flags, keeping existing ones first.
    pub fn extend<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(flags.into_iter().map(Into::into));
    }

    /// Flags as passed to the compiler.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Lexicographically ordered, de-duplicated flag set.
    pub fn canonical(&self) -> BTreeSet<&str> {
        self.0.iter().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One source file plus its literal includes.
///
/// Created when the build is configured and immutable for the rest of the
/// build invocation.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    id: UnitId,
    source: PathBuf,
    includes: Vec<IncludeDirective>,
    flags: CompileFlags,
    boundary: Arc<BoundaryMarker>,
    output: Option<PathBuf>,
}

impl TranslationUnit {
    /// Create a unit identified by its source path.
    pub fn new(
        source: impl Into<PathBuf>,
        includes: Vec<IncludeDirective>,
        flags: CompileFlags,
        boundary: Arc<BoundaryMarker>,
    ) -> Self {
        let source = source.into();
        TranslationUnit {
            id: UnitId::new(source.to_string_lossy().replace('\\', "/")),
            source,
            includes,
            flags,
            boundary,
            output: None,
        }
    }

    /// Set where the unit's object file should be written.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Literal includes as written in the source.
    pub fn includes(&self) -> &[IncludeDirective] {
        &self.includes
    }

    pub fn flags(&self) -> &CompileFlags {
        &self.flags
    }

    pub fn boundary(&self) -> &BoundaryMarker {
        &self.boundary
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_matches_resolved_header() {
        let boundary = BoundaryMarker::new("stable.h");
        assert!(boundary.is(&HeaderId::new("/proj/stable.h")));
        assert!(!boundary.is(&HeaderId::new("/proj/unstable.h")));
    }

    #[test]
    fn test_flags_canonical_is_order_insensitive() {
        let a = CompileFlags::new(["-O2", "-Wall", "-O2"]);
        let b = CompileFlags::new(["-Wall", "-O2"]);
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.as_slice().len(), 3);
    }

    #[test]
    fn test_unit_identity_from_source() {
        let unit = TranslationUnit::new(
            "src/myapp.cpp",
            vec![IncludeDirective::quoted("stable.h")],
            CompileFlags::default(),
            Arc::new(BoundaryMarker::new("stable.h")),
        );
        assert_eq!(unit.id().as_str(), "src/myapp.cpp");
        assert_eq!(unit.includes()[0].to_string(), "\"stable.h\"");
        assert!(unit.output().is_none());
    }
}
