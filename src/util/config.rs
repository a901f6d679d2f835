//! Configuration file support for harbour-pch.
//!
//! Two configuration file locations are read:
//! - Global: `~/.harbour/config.toml` - User-wide defaults
//! - Project: `.harbour/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// PCH build settings
    pub pch: PchSettings,
}

/// `[pch]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PchSettings {
    /// Artifact cache root (default: the platform cache directory)
    pub cache_dir: Option<PathBuf>,

    /// Number of units built in parallel (default: one per CPU)
    pub jobs: Option<usize>,

    /// Maximum seconds per compiler invocation (default: no limit)
    pub timeout_secs: Option<u64>,

    /// Path to the C compiler
    pub cc: Option<PathBuf>,

    /// Path to the C++ compiler
    pub cxx: Option<PathBuf>,
}

impl PchSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let other = other.pch;
        if other.cache_dir.is_some() {
            self.pch.cache_dir = other.cache_dir;
        }
        if other.jobs.is_some() {
            self.pch.jobs = other.jobs;
        }
        if other.timeout_secs.is_some() {
            self.pch.timeout_secs = other.timeout_secs;
        }
        if other.cc.is_some() {
            self.pch.cc = other.cc;
        }
        if other.cxx.is_some() {
            self.pch.cxx = other.cxx;
        }
    }
}

/// Load configuration from the global and project locations.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    config.merge(Config::load_or_default(project_path));

    config
}

/// Global configuration directory (`~/.harbour`).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".harbour"))
}

pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".harbour").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
[pch]
cache_dir = "/var/cache/pch"
jobs = 4
timeout_secs = 30
cxx = "/usr/bin/clang++"
"#,
        )
        .unwrap();

        assert_eq!(config.pch.cache_dir, Some(PathBuf::from("/var/cache/pch")));
        assert_eq!(config.pch.jobs, Some(4));
        assert_eq!(config.pch.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.pch.cc, None);
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = project_config_path(tmp.path());

        std::fs::write(&global, "[pch]\njobs = 2\ntimeout_secs = 10\n").unwrap();
        std::fs::create_dir_all(project.parent().unwrap()).unwrap();
        std::fs::write(&project, "[pch]\njobs = 8\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.pch.jobs, Some(8));
        assert_eq!(config.pch.timeout_secs, Some(10));
    }

    #[test]
    fn test_broken_config_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[pch\njobs = ").unwrap();

        assert!(Config::load(&path).is_err());
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
