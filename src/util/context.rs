//! Global context for harbour-pch operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::core::build_config::{find_manifest, ManifestError};
use crate::util::config::{self, Config};

/// Project directories for harbour-pch
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "harbour", "harbour-pch"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Default artifact cache root
    default_cache_dir: PathBuf,

    /// Merged global and project configuration
    config: Config,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let default_cache_dir = match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.cache_dir().to_path_buf(),
            None => config::global_config_dir()
                .map(|dir| dir.join("pch-cache"))
                .unwrap_or_else(|| cwd.join(".harbour").join("pch-cache")),
        };

        let project_root = find_manifest(&cwd)
            .ok()
            .and_then(|m| m.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| cwd.clone());
        let config = config::load_config(
            config::global_config_path().as_deref(),
            &config::project_config_path(&project_root),
        );

        GlobalContext {
            cwd,
            default_cache_dir,
            config,
            verbose: false,
            color: true,
        }
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Artifact cache root: `pch.cache_dir` if configured, else the
    /// platform cache directory. Relative paths are taken from cwd.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.config.pch.cache_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.cwd.join(dir),
            None => self.default_cache_dir.clone(),
        }
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Find `Pch.toml` starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf, ManifestError> {
        find_manifest(&self.cwd)
    }
}
