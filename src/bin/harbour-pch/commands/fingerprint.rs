//! `harbour-pch fingerprint` command

use anyhow::Result;

use crate::cli::FingerprintArgs;
use harbour_pch::core::BuildConfig;
use harbour_pch::ops::{compiler_identity, fingerprint_units, MessageFormat};
use harbour_pch::store::DiskStore;
use harbour_pch::util::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: FingerprintArgs) -> Result<()> {
    let manifest_path = super::manifest_path(ctx, args.manifest_path);
    let config = BuildConfig::load(&manifest_path)?;
    let units = config.translation_units()?;

    let cache_dir = ctx.cache_dir();
    let identity = compiler_identity(&config, &ctx.config().pch, &cache_dir.join("work"));
    let store = DiskStore::new(&cache_dir);

    let results = fingerprint_units(
        &config.scanner(),
        config.roles(),
        &units,
        &identity,
        &store,
    );

    let mut failed = false;
    for unit in &results {
        if args.message_format == MessageFormat::Json {
            println!("{}", unit.to_json());
            failed |= unit.result.is_err();
            continue;
        }

        match &unit.result {
            Ok(fingerprint) => {
                println!(
                    "{}  {} ({})",
                    fingerprint,
                    unit.unit,
                    if unit.cached { "cached" } else { "not cached" }
                );
                if ctx.is_verbose() {
                    for header in &unit.stable {
                        println!("    {}", header);
                    }
                }
            }
            Err(err) => {
                failed = true;
                eprint!(
                    "{}",
                    err.to_diagnostic()
                        .with_context(format!("unit: {}", unit.unit))
                        .format(ctx.color())
                );
            }
        }
    }

    if failed {
        std::process::exit(1);
    }

    Ok(())
}
