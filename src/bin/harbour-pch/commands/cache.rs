//! `harbour-pch cache` command
//!
//! Inspect and manage the precompiled header cache.

use anyhow::Result;

use crate::cli::{CacheArgs, CacheCommands};
use harbour_pch::store::stats::STATS_FILE;
use harbour_pch::store::{CacheStatistics, DiskStore};
use harbour_pch::util::GlobalContext;

pub fn execute(ctx: &GlobalContext, args: CacheArgs) -> Result<()> {
    match args.command {
        CacheCommands::Stats => show_stats(ctx),
        CacheCommands::ResetStats => reset_stats(ctx),
        CacheCommands::Path => show_path(ctx),
        CacheCommands::Clear => clear(ctx),
    }
}

/// Show counters and disk usage.
fn show_stats(ctx: &GlobalContext) -> Result<()> {
    let cache_dir = ctx.cache_dir();
    let stats = CacheStatistics::load(&cache_dir.join(STATS_FILE))?;
    let store = DiskStore::new(&cache_dir);
    let entries = store.entries()?;
    let size: u64 = entries.iter().map(|e| e.size).sum();

    println!("Cache directory: {}", cache_dir.display());
    println!();
    println!("  PCH hits:                 {}", stats.pch_hits);
    println!("  PCH misses:               {}", stats.pch_misses);
    match stats.hit_rate() {
        Some(rate) => println!("  Hit rate:                 {:.1}%", rate * 100.0),
        None => println!("  Hit rate:                 -"),
    }
    println!("  Stable builds:            {}", stats.stable_builds);
    println!("  Calls with PCH:           {}", stats.calls_with_pch);
    println!("  Ordering violations:      {}", stats.ordering_violations);
    println!("  Scan errors:              {}", stats.scan_errors);
    println!("  Stable failures:          {}", stats.stable_failures);
    println!("  Unstable failures:        {}", stats.unstable_failures);
    println!("  Timeouts:                 {}", stats.timeouts);
    println!("  Store errors:             {}", stats.store_errors);
    println!("  Nondeterministic outputs: {}", stats.nondeterministic_outputs);
    println!();
    println!("  Cached artifacts:         {}", entries.len());
    println!("  Cache size:               {}", format_size(size));

    Ok(())
}

fn reset_stats(ctx: &GlobalContext) -> Result<()> {
    let path = ctx.cache_dir().join(STATS_FILE);
    CacheStatistics::default().save(&path)?;
    eprintln!("       Reset statistics in {}", path.display());
    Ok(())
}

/// Show cache directory path.
fn show_path(ctx: &GlobalContext) -> Result<()> {
    println!("{}", ctx.cache_dir().display());
    Ok(())
}

fn clear(ctx: &GlobalContext) -> Result<()> {
    let store = DiskStore::new(ctx.cache_dir());
    let removed = store.clear()?;
    if removed == 0 {
        eprintln!("     Nothing to clean");
    } else {
        eprintln!("     Removed {} cached artifact(s)", removed);
    }
    Ok(())
}

/// Format a size in bytes to a human-readable string.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}
