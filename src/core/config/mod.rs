//! core::config
//!
//! Configuration loading.
//!
//! # Precedence
//!
//! Later sources override earlier ones:
//! 1. Defaults
//! 2. Global config file
//! 3. Repository config file (`<common_dir>/rbr/config.toml`)
//! 4. CLI flags (applied by the caller, not here)
//!
//! # Global Config Location
//!
//! 1. `$GIT_RBR_CONFIG` if set
//! 2. `<config_dir>/git-rbr/config.toml` (`$XDG_CONFIG_HOME` on Linux)
//!
//! Missing files are not an error. Files that exist but do not parse or
//! validate are, and are reported before anything is mutated.

pub mod schema;

pub use schema::ConfigFile;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::paths::RbrPaths;
use crate::core::types::BranchName;

/// Environment variable that overrides the global config location.
pub const CONFIG_ENV: &str = "GIT_RBR_CONFIG";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: ConfigFile,
    pub repo: ConfigFile,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration for the repository behind `paths`.
    pub fn load(paths: &RbrPaths) -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        Self::load_from(global.as_deref(), Some(&paths.config_path()))
    }

    /// Load from explicit file locations. Either may be absent.
    pub fn load_from(global: Option<&Path>, repo: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = Self::read_optional(global)?;
        let (repo, repo_path) = Self::read_optional(repo)?;

        global.validate()?;
        repo.validate()?;

        Ok(Self {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// Where the global config is looked up.
    pub fn global_config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("git-rbr").join("config.toml"))
    }

    fn read_optional(path: Option<&Path>) -> Result<(ConfigFile, Option<PathBuf>), ConfigError> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok((ConfigFile::default(), None));
        };

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok((file, Some(path.to_path_buf())))
    }

    /// Branches that are always roots. Repo list replaces the global list.
    pub fn trunk(&self) -> Vec<BranchName> {
        self.repo
            .trunk
            .as_ref()
            .or(self.global.trunk.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|name| BranchName::new(name.as_str()).ok())
            .collect()
    }

    pub fn restore_head(&self) -> bool {
        self.repo
            .restore_head
            .or(self.global.restore_head)
            .unwrap_or(true)
    }

    pub fn verbose(&self) -> bool {
        self.repo.verbose.or(self.global.verbose).unwrap_or(false)
    }

    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
