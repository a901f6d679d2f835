//! Per-unit build states and results.

use std::fmt;

use crate::builder::errors::BuildError;
use crate::core::artifact::{Fingerprint, ObjectArtifact, PchArtifact};

/// Where a unit is in its build.
///
/// `Pending → Validating → Fingerprinting → {ReusingArtifact |
/// BuildingArtifact} → BuildingUnstable → {Done | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Pending,
    Validating,
    Fingerprinting,
    ReusingArtifact,
    BuildingArtifact,
    BuildingUnstable,
    Done,
    Failed,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::Validating => "validating",
            UnitState::Fingerprinting => "fingerprinting",
            UnitState::ReusingArtifact => "reusing-artifact",
            UnitState::BuildingArtifact => "building-artifact",
            UnitState::BuildingUnstable => "building-unstable",
            UnitState::Done => "done",
            UnitState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Done | UnitState::Failed)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staleness decision for one fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// An artifact exists and can be reused as-is.
    Fresh(PchArtifact),
    /// No usable artifact; the stable prefix must be compiled.
    StaleRebuildNeeded,
}

impl Staleness {
    pub fn is_reusable(&self) -> bool {
        matches!(self, Staleness::Fresh(_))
    }
}

/// How a successful unit obtained its precompiled artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PchUsage {
    Reused,
    Built,
}

/// A failed unit: the stage it stopped in and why.
#[derive(Debug)]
pub struct BuildFailure {
    pub stage: UnitState,
    pub error: BuildError,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed while {}: {}", self.stage, self.error)
    }
}

/// Final result of building one translation unit.
#[derive(Debug)]
pub enum BuildOutcome {
    Done {
        object: ObjectArtifact,
        fingerprint: Fingerprint,
        pch: PchUsage,
    },
    Failed(BuildFailure),
}

impl BuildOutcome {
    pub fn failed(stage: UnitState, error: impl Into<BuildError>) -> Self {
        BuildOutcome::Failed(BuildFailure {
            stage,
            error: error.into(),
        })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BuildOutcome::Done { .. })
    }

    pub fn state(&self) -> UnitState {
        match self {
            BuildOutcome::Done { .. } => UnitState::Done,
            BuildOutcome::Failed(_) => UnitState::Failed,
        }
    }

    pub fn failure(&self) -> Option<&BuildFailure> {
        match self {
            BuildOutcome::Failed(failure) => Some(failure),
            BuildOutcome::Done { .. } => None,
        }
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            BuildOutcome::Done { fingerprint, .. } => Some(fingerprint),
            BuildOutcome::Failed(_) => None,
        }
    }
}
