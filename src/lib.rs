//! harbour-pch - precompiled header builds split at a boundary header
//!
//! Headers included before a project's boundary header are stable: they are
//! compiled once into a precompiled artifact and shared by every unit with
//! the same stable prefix, flags and compiler. Headers after the boundary
//! are recompiled with each unit.

pub mod builder;
pub mod core;
pub mod ops;
pub mod store;
pub mod util;

/// Test utilities and mocks for harbour-pch unit tests.
///
/// Provides in-memory scanners, compilers and stores so the coordinator can
/// be exercised without a real toolchain.
#[cfg(test)]
pub mod test_support;

pub use builder::BoundaryBuildCoordinator;
pub use crate::core::{BuildConfig, BuildOutcome, TranslationUnit};
pub use util::context::GlobalContext;
