//! High-level operations.
//!
//! This module contains the implementation of harbour-pch commands.

pub mod pch_build;
pub mod pch_check;
pub mod pch_fingerprint;

pub use pch_build::{build, project_compiler, BuildOptions, BuildResult, MessageFormat};
pub use pch_check::{check, check_units, CheckProblem, CheckReport, UnitCheck};
pub use pch_fingerprint::{compiler_identity, fingerprint_units, UnitFingerprint};
