//! harbour-pch CLI - boundary precompiled headers for C/C++ projects

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use harbour_pch::util::GlobalContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("harbour_pch=debug")
    } else {
        EnvFilter::new("harbour_pch=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(cli.verbose);
    ctx.set_color(!cli.no_color);
    if let Some(dir) = cli.cache_dir {
        ctx.config_mut().pch.cache_dir = Some(dir);
    }

    // Execute command
    match cli.command {
        Commands::Check(args) => commands::check::execute(&ctx, args),
        Commands::Fingerprint(args) => commands::fingerprint::execute(&ctx, args),
        Commands::Build(args) => commands::build::execute(&ctx, args),
        Commands::Cache(args) => commands::cache::execute(&ctx, args),
    }
}
