//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use keel_gatekeeper::ValidationConfig;
use keel_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where versions and drafts live
    #[serde(default)]
    pub storage: Storage,

    /// Registry TOML file; the built-in lending registry when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<PathBuf>,

    /// Editing session timing
    #[serde(default)]
    pub session: SessionConfig,

    /// Consistency rules
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Storage locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storage {
    /// SQLite database; `~/.keel/keel.db` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Draft directory; `~/.keel/drafts` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafts_dir: Option<PathBuf>,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Directory holding the default config, database and drafts.
    pub fn home() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".keel"))
    }

    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(Self::home()?.join("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there on first use.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        if let Err(e) = config.save_to(path) {
            warn!(path = %path.display(), error = %e, "Could not write default config");
        }
        Ok(config)
    }

    /// Load configuration from `path`, or defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config
            .session
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Resolved database path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home()?.join("keel.db")),
        }
    }

    /// Resolved draft directory.
    pub fn drafts_dir(&self) -> Result<PathBuf> {
        match &self.storage.drafts_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home()?.join("drafts")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
