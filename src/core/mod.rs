//! Core data structures for harbour-pch.
//!
//! - Translation units, include directives and the boundary marker
//! - Header identities and role assignments
//! - Fingerprints and compiled artifacts
//! - Per-unit build outcomes
//! - Project configuration (`Pch.toml`)

pub mod artifact;
pub mod build_config;
pub mod header;
pub mod outcome;
pub mod unit;

pub use artifact::{Fingerprint, ObjectArtifact, PchArtifact};
pub use build_config::{find_manifest, BuildConfig, UnitSpec, MANIFEST_NAME};
pub use header::{HeaderId, HeaderRole, RoleMap};
pub use outcome::{BuildFailure, BuildOutcome, PchUsage, Staleness, UnitState};
pub use unit::{BoundaryMarker, CompileFlags, IncludeDirective, IncludeKind, TranslationUnit, UnitId};
