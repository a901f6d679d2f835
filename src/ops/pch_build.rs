//! Build every unit of a project with boundary precompiled headers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::builder::compiler::{Compiler, GccCompiler};
use crate::builder::coordinator::BoundaryBuildCoordinator;
use crate::builder::events::{BuildEvent, EventSink, JsonLinesSink};
use crate::builder::executor::{BuildExecutor, BuildReport};
use crate::core::build_config::BuildConfig;
use crate::store::stats::STATS_FILE;
use crate::store::{CacheStatistics, DiskStore};

/// How build progress is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    /// Progress bar and summary on stderr (default)
    #[default]
    Human,
    /// One JSON event per line on stdout
    Json,
}

impl std::str::FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(MessageFormat::Human),
            "json" => Ok(MessageFormat::Json),
            _ => Err(format!(
                "invalid message format '{}', valid values: human, json",
                s
            )),
        }
    }
}

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Artifact cache root
    pub cache_dir: PathBuf,

    /// Object output directory (default: `<project>/.harbour/pch-out`)
    pub out_dir: Option<PathBuf>,

    /// Number of parallel jobs (None = one per CPU)
    pub jobs: Option<usize>,

    /// Maximum wall time per compiler invocation
    pub timeout: Option<Duration>,

    /// Explicit C compiler
    pub cc: Option<PathBuf>,

    /// Explicit C++ compiler
    pub cxx: Option<PathBuf>,

    pub message_format: MessageFormat,

    /// Verbose output
    pub verbose: bool,
}

impl BuildOptions {
    /// Scratch space for compiler invocations.
    pub fn work_dir(&self) -> PathBuf {
        self.cache_dir.join("work")
    }
}

/// Build result.
#[derive(Debug)]
pub struct BuildResult {
    pub report: BuildReport,

    /// Counters from this run only
    pub statistics: CacheStatistics,
}

/// Locate the compiler for a project: explicit paths, `CC`/`CXX`, or `PATH`,
/// set up with the project's include directories and language.
pub fn project_compiler(
    config: &BuildConfig,
    cc: Option<&Path>,
    cxx: Option<&Path>,
    work_dir: PathBuf,
) -> Result<GccCompiler> {
    let mut compiler =
        GccCompiler::detect(cc, cxx, work_dir)?.with_include_dirs(config.include_dirs().to_vec());
    if let Some(language) = config.language() {
        compiler = compiler.with_default_language(language);
    }
    Ok(compiler)
}

/// Build the project with the compiler from [`project_compiler`].
pub fn build(config: &BuildConfig, opts: &BuildOptions) -> Result<BuildResult> {
    let compiler = project_compiler(config, opts.cc.as_deref(), opts.cxx.as_deref(), opts.work_dir())?;
    tracing::debug!("compiler: {}", compiler.identity());

    build_with(config, opts, Arc::new(compiler))
}

/// Build the project with the given compiler.
pub fn build_with(
    config: &BuildConfig,
    opts: &BuildOptions,
    compiler: Arc<dyn Compiler>,
) -> Result<BuildResult> {
    let units = config.translation_units()?;
    let store = Arc::new(DiskStore::new(&opts.cache_dir));
    let out_dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| config.root().join(".harbour").join("pch-out"));

    let json = opts.message_format == MessageFormat::Json;
    let sink: Option<Arc<dyn EventSink>> = if json {
        Some(Arc::new(JsonLinesSink::new()))
    } else {
        None
    };

    let mut coordinator =
        BoundaryBuildCoordinator::new(Arc::new(config.scanner()), compiler, store, config.roles().clone())
            .with_timeout(opts.timeout)
            .with_out_dir(out_dir);
    if let Some(sink) = &sink {
        coordinator = coordinator.with_events(Arc::clone(sink));
    }

    tracing::debug!(
        "building {} unit(s) with boundary `{}`",
        units.len(),
        config.boundary().name()
    );
    let report = BuildExecutor::new(&coordinator)
        .verbose(opts.verbose)
        .quiet(json)
        .execute(&units, opts.jobs.unwrap_or(0));

    let statistics = coordinator.statistics();
    record_statistics(opts, &statistics);

    if let Some(sink) = &sink {
        sink.emit(BuildEvent::finished(
            report.built() as u64,
            report.failed() as u64,
            report.elapsed.as_millis() as u64,
        ));
    }

    Ok(BuildResult { report, statistics })
}

/// Fold this run's counters into the cache's persisted totals.
fn record_statistics(opts: &BuildOptions, run: &CacheStatistics) {
    let path = opts.cache_dir.join(STATS_FILE);
    let mut total = CacheStatistics::load(&path).unwrap_or_else(|e| {
        tracing::warn!("{:#}; starting statistics from zero", e);
        CacheStatistics::default()
    });
    total.merge(run);
    if let Err(e) = total.save(&path) {
        tracing::warn!("failed to save statistics: {:#}", e);
    }
}
