//! Build executor with progress reporting.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::coordinator::BoundaryBuildCoordinator;
use crate::core::outcome::BuildOutcome;
use crate::core::unit::{TranslationUnit, UnitId};

/// Runs a set of units through a coordinator with progress tracking.
pub struct BuildExecutor<'a> {
    coordinator: &'a BoundaryBuildCoordinator,
    verbose: bool,
    quiet: bool,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(coordinator: &'a BoundaryBuildCoordinator) -> Self {
        BuildExecutor {
            coordinator,
            verbose: false,
            quiet: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Suppress the progress bar and summary line.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build every unit on `jobs` threads (0 = one per CPU).
    pub fn execute(&self, units: &[TranslationUnit], jobs: usize) -> BuildReport {
        let start = Instant::now();

        if self.verbose && !self.quiet {
            eprintln!("   Compiling {} unit(s)", units.len());
        }

        let pb = if !self.verbose && !self.quiet && units.len() > 1 {
            let pb = ProgressBar::new(units.len() as u64);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let progress = BuildProgress::new(units.len());
        let outcomes = self.coordinator.build_all_with(units, jobs, &|unit, outcome| {
            progress.record(outcome);
            if let Some(pb) = &pb {
                pb.set_message(unit.id().to_string());
                pb.inc(1);
            }
        });

        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }

        let report = BuildReport {
            outcomes,
            elapsed: start.elapsed(),
        };

        if !self.quiet {
            eprintln!(
                "    Finished {} unit(s) in {:.2}s",
                report.built(),
                report.elapsed.as_secs_f64()
            );
        }

        report
    }
}

/// Outcomes of one executor run.
#[derive(Debug)]
pub struct BuildReport {
    pub outcomes: BTreeMap<UnitId, BuildOutcome>,
    pub elapsed: Duration,
}

impl BuildReport {
    /// Units that finished successfully.
    pub fn built(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.built()
    }

    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed units with their outcomes, in unit order.
    pub fn failures(&self) -> impl Iterator<Item = (&UnitId, &BuildOutcome)> {
        self.outcomes.iter().filter(|(_, o)| !o.is_done())
    }
}

/// Shared progress counters for a parallel build.
#[derive(Clone)]
pub struct BuildProgress {
    finished: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    total: usize,
}

impl BuildProgress {
    /// Create a new progress tracker.
    pub fn new(total: usize) -> Self {
        BuildProgress {
            finished: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            total,
        }
    }

    /// Record a unit reaching a terminal state.
    pub fn record(&self, outcome: &BuildOutcome) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        if !outcome.is_done() {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Get total progress as a fraction.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.finished_count() as f64 / self.total as f64
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Check if every unit has finished.
    pub fn is_complete(&self) -> bool {
        self.finished_count() >= self.total
    }
}
