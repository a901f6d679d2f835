//! Fingerprint reporting: what each unit's precompiled prefix would be keyed
//! by, and whether the store already holds it.

use std::path::Path;

use serde::Serialize;

use crate::builder::compiler::Compiler;
use crate::builder::errors::BuildError;
use crate::builder::fingerprint::{ContentDigests, FingerprintEngine};
use crate::builder::scanner::IncludeScanner;
use crate::builder::staleness::StalenessOracle;
use crate::builder::validate::{split_at_boundary, OrderingValidator};
use crate::core::artifact::Fingerprint;
use crate::core::build_config::BuildConfig;
use crate::core::header::{HeaderId, RoleMap};
use crate::core::unit::{TranslationUnit, UnitId};
use crate::ops::pch_build::project_compiler;
use crate::store::ArtifactStore;
use crate::util::config::PchSettings;

/// Identity used when no compiler can be found. Fingerprints computed with
/// it never match artifacts built by a real compiler.
pub const UNKNOWN_COMPILER: &str = "unknown-compiler";

/// Fingerprint of one unit's stable prefix.
#[derive(Debug)]
pub struct UnitFingerprint {
    pub unit: UnitId,
    pub stable: Vec<HeaderId>,
    pub result: Result<Fingerprint, BuildError>,
    /// Whether the store already holds an artifact for the fingerprint.
    pub cached: bool,
}

#[derive(Serialize)]
struct UnitFingerprintJson<'a> {
    unit: &'a str,
    fingerprint: Option<&'a str>,
    stable: Vec<&'a str>,
    cached: bool,
    error: Option<String>,
}

impl UnitFingerprint {
    /// One-line JSON form for `--message-format json`.
    pub fn to_json(&self) -> String {
        let json = UnitFingerprintJson {
            unit: self.unit.as_str(),
            fingerprint: self.result.as_ref().ok().map(Fingerprint::as_str),
            stable: self.stable.iter().map(HeaderId::as_str).collect(),
            cached: self.cached,
            error: self.result.as_ref().err().map(ToString::to_string),
        };
        serde_json::to_string(&json).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Identity of the compiler `build` would use, as folded into fingerprints.
pub fn compiler_identity(config: &BuildConfig, settings: &PchSettings, work_dir: &Path) -> String {
    match project_compiler(
        config,
        settings.cc.as_deref(),
        settings.cxx.as_deref(),
        work_dir.to_path_buf(),
    ) {
        Ok(compiler) => compiler.identity(),
        Err(err) => {
            tracing::warn!("{:#}; fingerprints will not match built artifacts", err);
            UNKNOWN_COMPILER.to_string()
        }
    }
}

/// Compute each unit's fingerprint the same way the coordinator does.
pub fn fingerprint_units(
    scanner: &dyn IncludeScanner,
    roles: &RoleMap,
    units: &[TranslationUnit],
    compiler_identity: &str,
    store: &dyn ArtifactStore,
) -> Vec<UnitFingerprint> {
    let validator = OrderingValidator::new(roles);
    let digests = ContentDigests::new();
    let oracle = StalenessOracle::new(store);

    units
        .iter()
        .map(|unit| {
            let mut stable_headers = Vec::new();
            let result = scanner
                .resolve(unit)
                .map_err(BuildError::from)
                .and_then(|resolved| {
                    let position = validator.validate(&resolved, unit.boundary())?;
                    let (stable, _) = split_at_boundary(&resolved, position);
                    stable_headers = stable.to_vec();
                    FingerprintEngine::new(scanner)
                        .with_compiler_identity(compiler_identity)
                        .with_digest_cache(&digests)
                        .compute(stable, unit.boundary(), unit.flags())
                        .map_err(BuildError::from)
                });

            let cached = result
                .as_ref()
                .map(|fp| oracle.is_reusable(fp))
                .unwrap_or(false);

            UnitFingerprint {
                unit: unit.id().clone(),
                stable: stable_headers,
                result,
                cached,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::builder::coordinator::BoundaryBuildCoordinator;
    use crate::store::MemoryStore;
    use crate::test_support::{myapp_roles, myapp_scanner, myapp_unit, MockCompiler};

    #[test]
    fn test_matches_coordinator_fingerprint() {
        let scanner = Arc::new(myapp_scanner());
        let store = Arc::new(MemoryStore::new());
        let compiler = Arc::new(MockCompiler::new());
        let unit = myapp_unit("myapp.cpp");

        let before = fingerprint_units(
            scanner.as_ref(),
            &myapp_roles(),
            std::slice::from_ref(&unit),
            &compiler.identity(),
            store.as_ref(),
        );
        assert!(!before[0].cached);
        assert_eq!(
            before[0].stable,
            vec![HeaderId::new("another.h"), HeaderId::new("stable.h")]
        );

        let tmp = tempfile::TempDir::new().unwrap();
        let coordinator = BoundaryBuildCoordinator::new(
            scanner.clone(),
            compiler.clone(),
            store.clone(),
            myapp_roles(),
        )
        .with_out_dir(tmp.path());
        let outcome = coordinator.build(&unit);

        let after = fingerprint_units(
            scanner.as_ref(),
            &myapp_roles(),
            std::slice::from_ref(&unit),
            &compiler.identity(),
            store.as_ref(),
        );
        assert!(after[0].cached);
        assert_eq!(after[0].result.as_ref().ok(), outcome.fingerprint());
    }

    #[test]
    fn test_ordering_violation_is_reported() {
        let scanner = myapp_scanner();
        let unit = TranslationUnit::new(
            "bad.cpp",
            vec![crate::core::unit::IncludeDirective::quoted("unstable.h")],
            Default::default(),
            Arc::new(crate::core::unit::BoundaryMarker::new("stable.h")),
        );

        let results = fingerprint_units(
            &scanner,
            &myapp_roles(),
            &[unit],
            "cc 1",
            &MemoryStore::new(),
        );

        assert!(matches!(results[0].result, Err(BuildError::Ordering(_))));
        assert!(!results[0].cached);
        assert!(results[0].to_json().contains("\"fingerprint\":null"));
    }
}
