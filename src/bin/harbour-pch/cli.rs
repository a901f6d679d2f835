//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use harbour_pch::ops::MessageFormat;

/// harbour-pch - precompiled headers split at a boundary header
#[derive(Parser)]
#[command(name = "harbour-pch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Artifact cache directory (overrides `pch.cache_dir`)
    #[arg(long, global = true, env = "HARBOUR_PCH_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check include order against the boundary without compiling
    Check(CheckArgs),

    /// Show each unit's stable-prefix fingerprint
    Fingerprint(FingerprintArgs),

    /// Build all units, reusing cached precompiled headers
    Build(BuildArgs),

    /// Inspect or clear the artifact cache
    Cache(CacheArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to Pch.toml (default: search upward from the current directory)
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args)]
pub struct FingerprintArgs {
    /// Path to Pch.toml (default: search upward from the current directory)
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Output format: human or json
    #[arg(long, default_value = "human")]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Path to Pch.toml (default: search upward from the current directory)
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Maximum seconds per compiler invocation
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory for object files
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Output format: human or json
    #[arg(long, default_value = "human")]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show hit/miss and failure counters
    Stats,

    /// Reset the counters to zero
    ResetStats,

    /// Print the cache directory
    Path,

    /// Remove every cached precompiled header
    Clear,
}
