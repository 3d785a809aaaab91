//! Configuration for revalidation timing
//!
//! Defines the two debounce windows and the batch size cap.

use crate::RevalidatorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the revalidator
///
/// # Examples
///
/// ```
/// use keel_revalidator::RevalidatorConfig;
///
/// // Default configuration (balanced)
/// let config = RevalidatorConfig::default();
/// assert_eq!(config.single_debounce_ms, 300);
///
/// // Fast feedback
/// let config = RevalidatorConfig::responsive();
/// assert_eq!(config.single_debounce_ms, 150);
///
/// // Fewer provider calls
/// let config = RevalidatorConfig::relaxed();
/// assert_eq!(config.batch_debounce_ms, 2000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevalidatorConfig {
    /// Quiet period after an edit before the edited field is checked
    /// Default: 300 ms
    pub single_debounce_ms: u64,

    /// Quiet period after a single check before its dependents are re-checked
    /// Default: 1000 ms
    pub batch_debounce_ms: u64,

    /// Most fields re-checked by one batch
    /// Default: 64
    pub max_batch_size: usize,
}

impl Default for RevalidatorConfig {
    fn default() -> Self {
        Self {
            single_debounce_ms: 300,
            batch_debounce_ms: 1000,
            max_batch_size: 64,
        }
    }
}

impl RevalidatorConfig {
    /// Shorter windows for quick feedback
    ///
    /// - Single: 150 ms
    /// - Batch: 500 ms
    pub fn responsive() -> Self {
        Self {
            single_debounce_ms: 150,
            batch_debounce_ms: 500,
            max_batch_size: 64,
        }
    }

    /// Longer windows when the check provider is slow or rate limited
    ///
    /// - Single: 600 ms
    /// - Batch: 2000 ms
    pub fn relaxed() -> Self {
        Self {
            single_debounce_ms: 600,
            batch_debounce_ms: 2000,
            max_batch_size: 32,
        }
    }

    /// Parse from TOML; missing keys take their defaults
    pub fn from_toml(text: &str) -> Result<Self, RevalidatorError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values are usable
    pub fn validate(&self) -> Result<(), RevalidatorError> {
        if self.max_batch_size == 0 {
            return Err(RevalidatorError::Config(
                "max_batch_size must be at least 1".into(),
            ));
        }
        if self.batch_debounce_ms < self.single_debounce_ms {
            return Err(RevalidatorError::Config(format!(
                "batch_debounce_ms ({}) must not be shorter than single_debounce_ms ({})",
                self.batch_debounce_ms, self.single_debounce_ms
            )));
        }
        Ok(())
    }

    /// Single-field debounce as Duration
    pub fn single_debounce(&self) -> Duration {
        Duration::from_millis(self.single_debounce_ms)
    }

    /// Batch debounce as Duration
    pub fn batch_debounce(&self) -> Duration {
        Duration::from_millis(self.batch_debounce_ms)
    }
}
