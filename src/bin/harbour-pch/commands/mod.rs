//! Command implementations

pub mod build;
pub mod cache;
pub mod check;
pub mod fingerprint;

use std::path::PathBuf;

use harbour_pch::util::diagnostic::{emit, suggestions, Diagnostic};
use harbour_pch::util::GlobalContext;

/// Explicit manifest path, or the nearest `Pch.toml` above cwd.
///
/// Exits with a diagnostic if there is none.
pub fn manifest_path(ctx: &GlobalContext, explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    match ctx.find_manifest() {
        Ok(path) => path,
        Err(err) => {
            emit(
                &Diagnostic::error(err.to_string()).with_suggestion(suggestions::NO_MANIFEST),
                ctx.color(),
            );
            std::process::exit(1);
        }
    }
}
