//! Include-order checking without compiling.
//!
//! Resolves every unit's includes and runs the ordering validator, reporting
//! every unit's problem instead of stopping at the first.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::errors::{OrderingViolation, ScanError};
use crate::builder::scanner::IncludeScanner;
use crate::builder::validate::{split_at_boundary, OrderingValidator};
use crate::core::build_config::BuildConfig;
use crate::core::header::{HeaderId, RoleMap};
use crate::core::unit::{TranslationUnit, UnitId};
use crate::util::diagnostic::Diagnostic;

/// Why a unit cannot use a precompiled prefix.
#[derive(Debug)]
pub enum CheckProblem {
    Ordering(OrderingViolation),
    Scan(ScanError),
}

impl CheckProblem {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            CheckProblem::Ordering(violation) => violation.to_diagnostic(),
            CheckProblem::Scan(err) => err.to_diagnostic(),
        }
    }
}

/// Check result for one unit.
#[derive(Debug)]
pub struct UnitCheck {
    pub unit: UnitId,
    pub source: PathBuf,
    /// Headers that would be precompiled, in order, ending with the boundary.
    pub stable: Vec<HeaderId>,
    /// Headers after the boundary.
    pub unstable: Vec<HeaderId>,
    pub problem: Option<CheckProblem>,
}

impl UnitCheck {
    pub fn is_ok(&self) -> bool {
        self.problem.is_none()
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub units: Vec<UnitCheck>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.units.iter().all(UnitCheck::is_ok)
    }

    pub fn problem_count(&self) -> usize {
        self.units.iter().filter(|u| !u.is_ok()).count()
    }

    /// Human-readable report.
    pub fn format(&self, color: bool, verbose: bool) -> String {
        let mut out = String::new();

        for unit in &self.units {
            match &unit.problem {
                None => {
                    let _ = writeln!(
                        out,
                        "{:>12} {} ({} stable, {} unstable)",
                        "Ok",
                        unit.unit,
                        unit.stable.len(),
                        unit.unstable.len()
                    );
                    if verbose {
                        for header in &unit.stable {
                            let _ = writeln!(out, "             stable   {}", header);
                        }
                        for header in &unit.unstable {
                            let _ = writeln!(out, "             unstable {}", header);
                        }
                    }
                }
                Some(problem) => {
                    let diag = problem.to_diagnostic().with_location(unit.source.clone());
                    let _ = writeln!(out, "{:>12} {}", "Failed", unit.unit);
                    out.push_str(&diag.format(color));
                }
            }
        }

        let _ = writeln!(
            out,
            "\n{} unit(s) checked, {} with problems",
            self.units.len(),
            self.problem_count()
        );
        out
    }
}

/// Check the project whose manifest is at `manifest_path`.
pub fn check(manifest_path: &Path) -> Result<CheckReport> {
    let config = BuildConfig::load(manifest_path)?;
    let units = config.translation_units()?;
    let scanner = config.scanner();
    Ok(check_units(&scanner, config.roles(), &units))
}

/// Resolve and validate each unit.
pub fn check_units(
    scanner: &dyn IncludeScanner,
    roles: &RoleMap,
    units: &[TranslationUnit],
) -> CheckReport {
    let validator = OrderingValidator::new(roles);

    let units = units
        .iter()
        .map(|unit| {
            let mut check = UnitCheck {
                unit: unit.id().clone(),
                source: unit.source().to_path_buf(),
                stable: Vec::new(),
                unstable: Vec::new(),
                problem: None,
            };

            let resolved = match scanner.resolve(unit) {
                Ok(resolved) => resolved,
                Err(err) => {
                    check.problem = Some(CheckProblem::Scan(err));
                    return check;
                }
            };

            match validator.validate(&resolved, unit.boundary()) {
                Ok(position) => {
                    let (stable, unstable) = split_at_boundary(&resolved, position);
                    check.stable = stable.to_vec();
                    check.unstable = unstable.to_vec();
                }
                Err(violation) => {
                    tracing::debug!("{}: {}", unit.id(), violation);
                    check.problem = Some(CheckProblem::Ordering(violation));
                }
            }
            check
        })
        .collect();

    CheckReport { units }
}
