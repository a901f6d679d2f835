//! Error taxonomy for PCH boundary builds.
//!
//! Every error is attached to the translation unit that produced it; none
//! of them abort sibling units.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::header::HeaderId;
use crate::store::StoreError;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Malformed boundary usage in a unit's resolved include list.
///
/// A configuration error: fatal to the unit and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum OrderingViolation {
    #[error("boundary missing: `{boundary}` is never included")]
    #[diagnostic(
        code(harbour_pch::ordering::boundary_missing),
        help("include the boundary header exactly once, after all stable headers")
    )]
    BoundaryMissing { boundary: String },

    #[error("boundary duplicated: `{boundary}` is included {} times", .positions.len())]
    #[diagnostic(
        code(harbour_pch::ordering::boundary_duplicated),
        help("remove all but one inclusion of the boundary header")
    )]
    BoundaryDuplicated {
        boundary: String,
        positions: Vec<usize>,
    },

    #[error("stable-after-boundary: `{header}` (position {position}) must precede `{boundary}` (position {boundary_position})")]
    #[diagnostic(
        code(harbour_pch::ordering::stable_after_boundary),
        help("move the stable include above the boundary header")
    )]
    StableAfterBoundary {
        header: HeaderId,
        position: usize,
        boundary: String,
        boundary_position: usize,
    },

    #[error("unstable-before-boundary: `{header}` (position {position}) must follow `{boundary}` (position {boundary_position})")]
    #[diagnostic(
        code(harbour_pch::ordering::unstable_before_boundary),
        help("move the unstable include below the boundary header")
    )]
    UnstableBeforeBoundary {
        header: HeaderId,
        position: usize,
        boundary: String,
        boundary_position: usize,
    },
}

impl OrderingViolation {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderingViolation::BoundaryMissing { .. } => "boundary missing",
            OrderingViolation::BoundaryDuplicated { .. } => "boundary duplicated",
            OrderingViolation::StableAfterBoundary { .. } => "stable-after-boundary",
            OrderingViolation::UnstableBeforeBoundary { .. } => "unstable-before-boundary",
        }
    }

    /// The offending header, if the violation is about a specific one.
    pub fn header(&self) -> Option<&HeaderId> {
        match self {
            OrderingViolation::StableAfterBoundary { header, .. }
            | OrderingViolation::UnstableBeforeBoundary { header, .. } => Some(header),
            _ => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            OrderingViolation::BoundaryMissing { boundary } => diag
                .with_context(format!("no resolved include matches `{}`", boundary))
                .with_suggestion(format!("Add `#include \"{}\"` after the stable includes", boundary))
                .with_suggestion(suggestions::CHECK_BOUNDARY),
            OrderingViolation::BoundaryDuplicated {
                boundary,
                positions,
            } => {
                let positions: Vec<_> = positions.iter().map(ToString::to_string).collect();
                diag.with_context(format!(
                    "`{}` appears at positions {}",
                    boundary,
                    positions.join(", ")
                ))
                .with_suggestion("Include the boundary header once, directly in the source file")
            }
            OrderingViolation::StableAfterBoundary {
                header, boundary, ..
            } => diag
                .with_context(format!("expected position: before `{}`", boundary))
                .with_suggestion(format!("Move `#include` of `{}` above `{}`", header, boundary)),
            OrderingViolation::UnstableBeforeBoundary {
                header, boundary, ..
            } => diag
                .with_context(format!("expected position: after `{}`", boundary))
                .with_suggestion(format!("Move `#include` of `{}` below `{}`", header, boundary)),
        }
    }
}

/// Failure reading or resolving includes.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot find include `{include}` from {}", .included_from.display())]
    NotFound {
        include: String,
        included_from: PathBuf,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            ScanError::NotFound { included_from, .. } => diag
                .with_location(included_from.clone())
                .with_suggestion("Add the header's directory to `include_dirs` in Pch.toml"),
            ScanError::Read { path, .. } => diag
                .with_location(path.clone())
                .with_suggestion("Check that the file exists and is readable"),
        }
    }
}

/// Which compile step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePhase {
    /// Compiling the stable prefix into a precompiled artifact.
    Stable,
    /// Compiling the unstable suffix against the artifact.
    Unstable,
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilePhase::Stable => write!(f, "stable"),
            CompilePhase::Unstable => write!(f, "unstable"),
        }
    }
}

/// The compiler rejected its input or could not run.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("{diagnostic}")]
    Rejected { diagnostic: String },

    #[error("timeout")]
    TimedOut { after: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error("failed to invoke compiler: {message}")]
    Invocation { message: String },
}

/// Error attached to a failed unit.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Ordering(#[from] OrderingViolation),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("{phase} compile failed: {source}")]
    Compile {
        phase: CompilePhase,
        #[source]
        source: CompileError,
    },

    #[error("artifact store failed: {0}")]
    Store(#[from] StoreError),

    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    pub fn compile(phase: CompilePhase, source: CompileError) -> Self {
        BuildError::Compile { phase, source }
    }

    /// Whether this failure was a compiler timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BuildError::Compile {
                source: CompileError::TimedOut { .. },
                ..
            }
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::Ordering(v) => v.to_diagnostic(),
            BuildError::Scan(e) => e.to_diagnostic(),
            BuildError::Compile { phase, source } => {
                let mut diag = Diagnostic::error(format!("{} compile failed", phase));
                match source {
                    CompileError::Rejected { diagnostic } => {
                        for line in diagnostic.lines().filter(|l| !l.trim().is_empty()) {
                            diag = diag.with_context(line);
                        }
                    }
                    CompileError::TimedOut { after } => {
                        diag = diag
                            .with_context(format!("timeout after {:.1}s", after.as_secs_f64()))
                            .with_suggestion("Raise `timeout_secs` in config.toml or pass --timeout");
                    }
                    other => diag = diag.with_context(other.to_string()),
                }
                if *phase == CompilePhase::Stable {
                    diag = diag.with_context("the unstable part was not compiled");
                }
                diag.with_suggestion(suggestions::BUILD_FAILED)
            }
            BuildError::Store(e) => Diagnostic::error(self.to_string())
                .with_context(e.to_string())
                .with_suggestion(suggestions::CACHE_CLEAR),
            BuildError::Cancelled => Diagnostic::error("build cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_kinds() {
        let v = OrderingViolation::StableAfterBoundary {
            header: HeaderId::new("another.h"),
            position: 2,
            boundary: "stable.h".to_string(),
            boundary_position: 1,
        };
        assert_eq!(v.kind(), "stable-after-boundary");
        assert_eq!(v.header(), Some(&HeaderId::new("another.h")));
        assert!(v.to_string().contains("another.h"));

        let missing = OrderingViolation::BoundaryMissing {
            boundary: "stable.h".to_string(),
        };
        assert_eq!(missing.kind(), "boundary missing");
        assert!(missing.header().is_none());
    }

    #[test]
    fn test_violation_diagnostic_names_expected_position() {
        let v = OrderingViolation::UnstableBeforeBoundary {
            header: HeaderId::new("unstable.h"),
            position: 0,
            boundary: "stable.h".to_string(),
            boundary_position: 1,
        };
        let out = v.to_diagnostic().format(false);
        assert!(out.contains("unstable-before-boundary"));
        assert!(out.contains("expected position: after `stable.h`"));
    }

    #[test]
    fn test_timeout_display() {
        let err = BuildError::compile(
            CompilePhase::Unstable,
            CompileError::TimedOut {
                after: Duration::from_secs(3),
            },
        );
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "unstable compile failed: timeout");
    }

    #[test]
    fn test_stable_failure_diagnostic() {
        let err = BuildError::compile(
            CompilePhase::Stable,
            CompileError::Rejected {
                diagnostic: "stable.h:3: error: expected ';'\n".to_string(),
            },
        );
        let out = err.to_diagnostic().format(false);
        assert!(out.contains("stable compile failed"));
        assert!(out.contains("expected ';'"));
        assert!(out.contains("unstable part was not compiled"));
    }
}
