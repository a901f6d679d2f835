//! `harbour-pch build` command

use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::BuildArgs;
use harbour_pch::builder::BuildError;
use harbour_pch::core::{BuildConfig, BuildOutcome};
use harbour_pch::ops::{build, BuildOptions, MessageFormat};
use harbour_pch::util::diagnostic::emit;
use harbour_pch::util::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: BuildArgs) -> Result<()> {
    let manifest_path = super::manifest_path(ctx, args.manifest_path);
    let config = BuildConfig::load(&manifest_path)?;
    let settings = &ctx.config().pch;

    // CLI > config > default
    let opts = BuildOptions {
        cache_dir: ctx.cache_dir(),
        out_dir: args.out_dir,
        jobs: args.jobs.or(settings.jobs),
        timeout: args.timeout.map(Duration::from_secs).or_else(|| settings.timeout()),
        cc: settings.cc.clone(),
        cxx: settings.cxx.clone(),
        message_format: args.message_format,
        verbose: ctx.is_verbose(),
    };

    let result = build(&config, &opts)?;

    if opts.message_format == MessageFormat::Human {
        for (unit, outcome) in result.report.failures() {
            let BuildOutcome::Failed(failure) = outcome else {
                continue;
            };
            match &failure.error {
                BuildError::Ordering(violation) => {
                    eprintln!("{:?}", miette::Report::new(violation.clone()).wrap_err(format!("in {}", unit)));
                }
                error => emit(
                    &error
                        .to_diagnostic()
                        .with_context(format!("unit: {} (while {})", unit, failure.stage)),
                    ctx.color(),
                ),
            }
        }

        if ctx.is_verbose() {
            let stats = &result.statistics;
            eprintln!(
                "   PCH reuse {} hit(s), {} miss(es), {} stable build(s)",
                stats.pch_hits, stats.pch_misses, stats.stable_builds
            );
        }
    }

    if !result.report.success() {
        bail!("{} of {} unit(s) failed", result.report.failed(), result.report.outcomes.len());
    }

    Ok(())
}
