//! Per-unit orchestration of boundary builds.
//!
//! For each translation unit: resolve and validate its includes, fingerprint
//! the stable prefix, reuse or build the precompiled artifact, then compile
//! the unit against it. Units run in parallel; the only coordination between
//! them is a per-fingerprint lock that makes concurrent units with the same
//! stable prefix share one stable compile.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::builder::compiler::{CancelToken, CompileBudget, Compiler};
use crate::builder::errors::{BuildError, CompileError, CompilePhase};
use crate::builder::events::{BuildEvent, EventSink};
use crate::builder::fingerprint::{ContentDigests, FingerprintEngine};
use crate::builder::scanner::IncludeScanner;
use crate::builder::staleness::StalenessOracle;
use crate::builder::validate::{direct_stable_includes, split_at_boundary, OrderingValidator};
use crate::core::artifact::{Fingerprint, ObjectArtifact, PchArtifact};
use crate::core::header::{HeaderId, RoleMap};
use crate::core::outcome::{BuildOutcome, PchUsage, Staleness, UnitState};
use crate::core::unit::{TranslationUnit, UnitId};
use crate::store::stats::Counter;
use crate::store::{ArtifactStore, CacheStatistics, StatsCounters, StoreError};
use crate::util::hash::sha256_str;

/// Tracks one unit's state transitions for logging and failure reporting.
struct Progression<'u> {
    unit: &'u UnitId,
    state: UnitState,
}

impl<'u> Progression<'u> {
    fn new(unit: &'u UnitId) -> Self {
        Progression {
            unit,
            state: UnitState::Pending,
        }
    }

    fn advance(&mut self, next: UnitState) {
        tracing::debug!("{}: {} -> {}", self.unit, self.state, next);
        self.state = next;
    }
}

/// Orchestrates validation, fingerprinting, reuse and compilation per unit.
///
/// Safe to share across threads; [`build`](Self::build) may be called for
/// many units concurrently.
pub struct BoundaryBuildCoordinator {
    scanner: Arc<dyn IncludeScanner>,
    compiler: Arc<dyn Compiler>,
    store: Arc<dyn ArtifactStore>,
    roles: RoleMap,
    compiler_identity: String,
    timeout: Option<Duration>,
    out_dir: PathBuf,
    cancel: CancelToken,
    in_flight: DashMap<Fingerprint, Arc<Mutex<()>>>,
    digests: ContentDigests,
    stats: StatsCounters,
    events: Option<Arc<dyn EventSink>>,
}

impl BoundaryBuildCoordinator {
    pub fn new(
        scanner: Arc<dyn IncludeScanner>,
        compiler: Arc<dyn Compiler>,
        store: Arc<dyn ArtifactStore>,
        roles: RoleMap,
    ) -> Self {
        let compiler_identity = compiler.identity();
        BoundaryBuildCoordinator {
            scanner,
            compiler,
            store,
            roles,
            compiler_identity,
            timeout: None,
            out_dir: PathBuf::from("."),
            cancel: CancelToken::new(),
            in_flight: DashMap::new(),
            digests: ContentDigests::new(),
            stats: StatsCounters::new(),
            events: None,
        }
    }

    /// Maximum wall time for each compiler call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory for object files of units without an explicit output.
    pub fn with_out_dir(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = out_dir.into();
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Counters accumulated by this coordinator so far.
    pub fn statistics(&self) -> CacheStatistics {
        self.stats.snapshot()
    }

    /// Build every unit, fanning out over `jobs` threads (0 = one per CPU).
    ///
    /// One unit's failure never stops the others; the map holds every
    /// unit's outcome.
    pub fn build_all(&self, units: &[TranslationUnit], jobs: usize) -> BTreeMap<UnitId, BuildOutcome> {
        self.build_all_with(units, jobs, &|_, _| {})
    }

    /// Like [`build_all`](Self::build_all), calling `on_done` as each unit finishes.
    pub fn build_all_with(
        &self,
        units: &[TranslationUnit],
        jobs: usize,
        on_done: &(dyn Fn(&TranslationUnit, &BuildOutcome) + Sync),
    ) -> BTreeMap<UnitId, BuildOutcome> {
        let run = || {
            units
                .par_iter()
                .map(|unit| {
                    let outcome = self.build(unit);
                    on_done(unit, &outcome);
                    (unit.id().clone(), outcome)
                })
                .collect::<BTreeMap<_, _>>()
        };

        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool.install(run),
            Err(err) => {
                tracing::warn!("failed to create a {}-thread pool, using the global pool: {}", jobs, err);
                run()
            }
        }
    }

    /// Build one translation unit.
    pub fn build(&self, unit: &TranslationUnit) -> BuildOutcome {
        let mut progression = Progression::new(unit.id());

        match self.run(unit, &mut progression) {
            Ok((object, fingerprint, pch)) => {
                progression.advance(UnitState::Done);
                self.emit(|| BuildEvent::UnitFinished {
                    unit: unit.id().to_string(),
                    fingerprint: fingerprint.to_string(),
                    object: object.path.clone(),
                    fresh: pch == PchUsage::Reused,
                });
                BuildOutcome::Done {
                    object,
                    fingerprint,
                    pch,
                }
            }
            Err(error) => {
                let stage = progression.state;
                progression.advance(UnitState::Failed);
                self.count_failure(&error);
                tracing::debug!("{}: {}", unit.id(), error);
                self.emit(|| BuildEvent::UnitFailed {
                    unit: unit.id().to_string(),
                    stage: stage.to_string(),
                    message: error.to_string(),
                    header: match &error {
                        BuildError::Ordering(v) => v.header().map(ToString::to_string),
                        _ => None,
                    },
                });
                BuildOutcome::failed(stage, error)
            }
        }
    }

    fn run(
        &self,
        unit: &TranslationUnit,
        progression: &mut Progression<'_>,
    ) -> Result<(ObjectArtifact, Fingerprint, PchUsage), BuildError> {
        self.check_cancelled()?;

        progression.advance(UnitState::Validating);
        let resolved = self.scanner.resolve(unit)?;
        let boundary_position =
            OrderingValidator::new(&self.roles).validate(&resolved, unit.boundary())?;
        let (stable, unstable) = split_at_boundary(&resolved, boundary_position);
        tracing::trace!(
            "{}: {} stable, {} unstable header(s)",
            unit.id(),
            stable.len(),
            unstable.len()
        );

        progression.advance(UnitState::Fingerprinting);
        let fingerprint = FingerprintEngine::new(self.scanner.as_ref())
            .with_compiler_identity(&self.compiler_identity)
            .with_digest_cache(&self.digests)
            .compute(stable, unit.boundary(), unit.flags())?;
        self.check_cancelled()?;

        let (pch, usage) = match self.lookup(&fingerprint) {
            Staleness::Fresh(artifact) => {
                progression.advance(UnitState::ReusingArtifact);
                self.reused(unit, &fingerprint);
                (artifact, PchUsage::Reused)
            }
            Staleness::StaleRebuildNeeded => {
                progression.advance(UnitState::BuildingArtifact);
                self.build_artifact(unit, stable, &fingerprint)?
            }
        };
        match usage {
            PchUsage::Reused => self.stats.bump(Counter::PchHit),
            PchUsage::Built => self.stats.bump(Counter::PchMiss),
        }

        progression.advance(UnitState::BuildingUnstable);
        self.check_cancelled()?;
        let budget = self.budget();
        let output = self.object_path(unit);
        let object = self
            .compiler
            .compile_unstable(unit.source(), &pch, unit.flags(), &output, &budget)
            .and_then(|object| within_budget(object, &budget))
            .map_err(|e| compile_failed(CompilePhase::Unstable, e))?;
        self.stats.bump(Counter::CallWithPch);

        Ok((object, fingerprint, usage))
    }

    /// Obtain the artifact for a fingerprint that missed the store.
    ///
    /// Serialized per fingerprint: the first unit compiles and publishes,
    /// units waiting on the same fingerprint find the published artifact
    /// when they get the lock.
    fn build_artifact(
        &self,
        unit: &TranslationUnit,
        stable: &[HeaderId],
        fingerprint: &Fingerprint,
    ) -> Result<(PchArtifact, PchUsage), BuildError> {
        let lock = self
            .in_flight
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock();
            match self.lookup(fingerprint) {
                Staleness::Fresh(artifact) => {
                    self.reused(unit, fingerprint);
                    Ok((artifact, PchUsage::Reused))
                }
                Staleness::StaleRebuildNeeded => self
                    .compile_and_publish(unit, stable, fingerprint)
                    .map(|artifact| (artifact, PchUsage::Built)),
            }
        };

        drop(lock);
        self.in_flight
            .remove_if(fingerprint, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn compile_and_publish(
        &self,
        unit: &TranslationUnit,
        stable: &[HeaderId],
        fingerprint: &Fingerprint,
    ) -> Result<PchArtifact, BuildError> {
        self.check_cancelled()?;
        tracing::info!(
            "building precompiled header {} for {} ({} header(s))",
            fingerprint.short(),
            unit.id(),
            stable.len()
        );

        // The fingerprint covers the whole expansion; the compiler only
        // needs the unit's own includes, which pull in the rest.
        let direct = self.scanner.resolve_direct(unit)?;
        let prefix = direct_stable_includes(&direct, stable);

        let budget = self.budget();
        let artifact = self
            .compiler
            .compile_stable(&prefix, unit.flags(), &budget)
            .and_then(|artifact| within_budget(artifact, &budget))
            .map_err(|e| compile_failed(CompilePhase::Stable, e))?;
        self.stats.bump(Counter::StableBuild);

        // Nothing is published for an abandoned build.
        self.check_cancelled()?;

        let published = self.store.put_if_absent(fingerprint, &artifact)?;
        let artifact = if published {
            artifact
        } else {
            self.reconcile(fingerprint, artifact)?
        };

        self.emit(|| BuildEvent::PchBuilt {
            unit: unit.id().to_string(),
            fingerprint: fingerprint.to_string(),
            headers: stable.len(),
            size: artifact.len(),
            published,
        });
        Ok(artifact)
    }

    /// Another writer (typically another process sharing the cache) got
    /// there first.
    ///
    /// The store is append-only per fingerprint, so the first published
    /// artifact stays authoritative and this later writer adopts it. A
    /// differing output is logged and counted, never written over.
    fn reconcile(&self, fingerprint: &Fingerprint, ours: PchArtifact) -> Result<PchArtifact, StoreError> {
        let Some(stored) = self.store.get(fingerprint)? else {
            return Err(StoreError::Unreachable {
                reason: format!(
                    "{} reported an entry for {} that cannot be read back",
                    self.store.describe(),
                    fingerprint.short()
                ),
            });
        };

        if stored.checksum() != ours.checksum() {
            tracing::warn!(
                "compiler output for {} differs from the stored artifact ({} vs {}); using the stored one",
                fingerprint.short(),
                &ours.checksum()[..12],
                &stored.checksum()[..12]
            );
            self.stats.bump(Counter::NondeterministicOutput);
        }
        Ok(stored)
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Staleness {
        match StalenessOracle::new(self.store.as_ref()).lookup(fingerprint) {
            Ok(staleness) => staleness,
            Err(err) => {
                tracing::warn!(
                    "artifact lookup for {} failed, rebuilding: {}",
                    fingerprint.short(),
                    err
                );
                self.stats.bump(Counter::StoreError);
                Staleness::StaleRebuildNeeded
            }
        }
    }

    fn reused(&self, unit: &TranslationUnit, fingerprint: &Fingerprint) {
        tracing::debug!("{}: reusing precompiled header {}", unit.id(), fingerprint.short());
        self.emit(|| BuildEvent::PchReused {
            unit: unit.id().to_string(),
            fingerprint: fingerprint.to_string(),
        });
    }

    fn count_failure(&self, error: &BuildError) {
        let counter = match error {
            BuildError::Ordering(_) => Counter::OrderingViolation,
            BuildError::Scan(_) => Counter::ScanError,
            BuildError::Compile {
                phase: CompilePhase::Stable,
                ..
            } => Counter::StableFailure,
            BuildError::Compile {
                phase: CompilePhase::Unstable,
                ..
            } => Counter::UnstableFailure,
            BuildError::Store(_) => Counter::StoreError,
            BuildError::Cancelled => return,
        };
        self.stats.bump(counter);
        if error.is_timeout() {
            self.stats.bump(Counter::Timeout);
        }
    }

    fn budget(&self) -> CompileBudget {
        CompileBudget::start(self.timeout, self.cancel.clone())
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        if self.cancel.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn object_path(&self, unit: &TranslationUnit) -> PathBuf {
        if let Some(output) = unit.output() {
            return output.to_path_buf();
        }
        let stem = unit
            .source()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unit".to_string());
        let tag = sha256_str(unit.id().as_str());
        self.out_dir.join(format!("{}-{}.o", stem, &tag[..8]))
    }

    fn emit(&self, event: impl FnOnce() -> BuildEvent) {
        if let Some(sink) = &self.events {
            sink.emit(event());
        }
    }
}

/// A call that returns after its deadline still counts as timed out.
fn within_budget<T>(value: T, budget: &CompileBudget) -> Result<T, CompileError> {
    if budget.is_cancelled() {
        Err(CompileError::Cancelled)
    } else if budget.is_expired() {
        Err(budget.timed_out())
    } else {
        Ok(value)
    }
}

fn compile_failed(phase: CompilePhase, error: CompileError) -> BuildError {
    match error {
        CompileError::Cancelled => BuildError::Cancelled,
        other => BuildError::compile(phase, other),
    }
}
