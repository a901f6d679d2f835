//! PCH cache statistics.
//!
//! [`StatsCounters`] are bumped lock-free by concurrently building units;
//! [`CacheStatistics`] is the persisted `stats.json` the CLI accumulates
//! across invocations.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs::write_atomic;

/// Statistics file name inside the cache root.
pub const STATS_FILE: &str = "stats.json";

/// Accumulated cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStatistics {
    /// Units that reused an existing precompiled artifact
    pub pch_hits: u64,
    /// Units whose fingerprint had no usable artifact
    pub pch_misses: u64,
    /// Stable-prefix compilations performed
    pub stable_builds: u64,
    /// Unstable compilations that used a precompiled artifact
    pub calls_with_pch: u64,
    /// Units rejected by the ordering validator
    pub ordering_violations: u64,
    /// Units that failed to scan a header
    pub scan_errors: u64,
    /// Stable-phase compiler failures
    pub stable_failures: u64,
    /// Unstable-phase compiler failures
    pub unstable_failures: u64,
    /// Compiler invocations that exceeded the timeout
    pub timeouts: u64,
    /// Store lookups or writes that failed
    pub store_errors: u64,
    /// Times a concurrent builder published a different artifact for the same key
    pub nondeterministic_outputs: u64,
}

impl CacheStatistics {
    /// Load statistics, defaulting to zero if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(CacheStatistics::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read statistics: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse statistics: {}", path.display()))
    }

    /// Save statistics atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }

    /// Add another set of counts to this one.
    pub fn merge(&mut self, other: &CacheStatistics) {
        self.pch_hits += other.pch_hits;
        self.pch_misses += other.pch_misses;
        self.stable_builds += other.stable_builds;
        self.calls_with_pch += other.calls_with_pch;
        self.ordering_violations += other.ordering_violations;
        self.scan_errors += other.scan_errors;
        self.stable_failures += other.stable_failures;
        self.unstable_failures += other.unstable_failures;
        self.timeouts += other.timeouts;
        self.store_errors += other.store_errors;
        self.nondeterministic_outputs += other.nondeterministic_outputs;
    }

    /// Fraction of fingerprint lookups that hit, or `None` before any lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.pch_hits + self.pch_misses;
        if total == 0 {
            None
        } else {
            Some(self.pch_hits as f64 / total as f64)
        }
    }
}

/// Which counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    PchHit,
    PchMiss,
    StableBuild,
    CallWithPch,
    OrderingViolation,
    ScanError,
    StableFailure,
    UnstableFailure,
    Timeout,
    StoreError,
    NondeterministicOutput,
}

/// Lock-free counters shared by concurrently building units.
#[derive(Debug, Default)]
pub struct StatsCounters {
    counters: [AtomicU64; 11],
}

impl StatsCounters {
    pub fn new() -> Self {
        StatsCounters::default()
    }

    pub fn bump(&self, counter: Counter) {
        self.counters[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> CacheStatistics {
        CacheStatistics {
            pch_hits: self.get(Counter::PchHit),
            pch_misses: self.get(Counter::PchMiss),
            stable_builds: self.get(Counter::StableBuild),
            calls_with_pch: self.get(Counter::CallWithPch),
            ordering_violations: self.get(Counter::OrderingViolation),
            scan_errors: self.get(Counter::ScanError),
            stable_failures: self.get(Counter::StableFailure),
            unstable_failures: self.get(Counter::UnstableFailure),
            timeouts: self.get(Counter::Timeout),
            store_errors: self.get(Counter::StoreError),
            nondeterministic_outputs: self.get(Counter::NondeterministicOutput),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counters_snapshot() {
        let counters = StatsCounters::new();
        counters.bump(Counter::PchHit);
        counters.bump(Counter::PchHit);
        counters.bump(Counter::PchMiss);
        counters.bump(Counter::NondeterministicOutput);

        let stats = counters.snapshot();
        assert_eq!(stats.pch_hits, 2);
        assert_eq!(stats.pch_misses, 1);
        assert_eq!(stats.nondeterministic_outputs, 1);
        assert_eq!(stats.stable_builds, 0);
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStatistics::default().hit_rate(), None);
        let stats = CacheStatistics {
            pch_hits: 3,
            pch_misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), Some(0.75));
    }

    #[test]
    fn test_load_save_merge() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(STATS_FILE);

        assert_eq!(CacheStatistics::load(&path).unwrap(), CacheStatistics::default());

        let mut stats = CacheStatistics {
            pch_hits: 1,
            stable_builds: 1,
            ..Default::default()
        };
        stats.save(&path).unwrap();

        let mut loaded = CacheStatistics::load(&path).unwrap();
        assert_eq!(loaded, stats);

        loaded.merge(&stats);
        assert_eq!(loaded.pch_hits, 2);
        stats.merge(&CacheStatistics::default());
        assert_eq!(stats.pch_hits, 1);
    }
}
