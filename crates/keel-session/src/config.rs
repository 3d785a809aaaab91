//! Session configuration
//!
//! Timing for local drafts and restoration, plus the revalidation windows.

use crate::SessionError;
use keel_domain::RecordId;
use keel_revalidator::RevalidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for an editing session
///
/// # Examples
///
/// ```
/// use keel_session::SessionConfig;
///
/// let config = SessionConfig::from_toml(r#"
///     draft_debounce_ms = 500
///
///     [revalidation]
///     single_debounce_ms = 200
/// "#).unwrap();
/// assert_eq!(config.draft_debounce_ms, 500);
/// assert_eq!(config.restore_grace_ms, 2000);
/// assert_eq!(config.revalidation.single_debounce_ms, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after a mutation before the local draft is written
    /// Default: 1500 ms
    pub draft_debounce_ms: u64,

    /// After restoring a draft, persisted versions arriving within this
    /// window are ignored
    /// Default: 2000 ms
    pub restore_grace_ms: u64,

    /// Prefix of draft keys; the record id is appended
    /// Default: "keel-draft:"
    pub draft_key_prefix: String,

    /// Debounce windows for consistency checks
    pub revalidation: RevalidatorConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            draft_debounce_ms: 1500,
            restore_grace_ms: 2000,
            draft_key_prefix: "keel-draft:".to_string(),
            revalidation: RevalidatorConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse from TOML; missing keys take their defaults
    pub fn from_toml(text: &str) -> Result<Self, SessionError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.draft_key_prefix.is_empty() {
            return Err(SessionError::Config("draft_key_prefix must not be empty".into()));
        }
        self.revalidation.validate()?;
        Ok(())
    }

    /// Draft debounce as Duration
    pub fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }

    /// Restoration grace window as Duration
    pub fn restore_grace(&self) -> Duration {
        Duration::from_millis(self.restore_grace_ms)
    }

    /// Draft key for a record
    pub fn draft_key(&self, record: RecordId) -> String {
        format!("{}{}", self.draft_key_prefix, record)
    }
}
