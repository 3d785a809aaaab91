//! Gatekeeper configuration

use crate::GatekeeperError;
use keel_domain::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Inclusive numeric bounds for one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldBounds {
    /// Smallest allowed value
    pub min: Option<f64>,
    /// Largest allowed value
    pub max: Option<f64>,
}

impl FieldBounds {
    /// Whether `value` falls inside the bounds
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Check values against the registry's declared type
    pub validate_types: bool,

    /// Check percentages, amounts and configured bounds
    pub validate_ranges: bool,

    /// Check LTV/LTC against the policy maxima
    pub validate_policy: bool,

    /// Warn when a user value differs from an external proposal
    pub validate_divergence: bool,

    /// Maximum loan-to-value, percent
    pub max_ltv_percent: f64,

    /// Maximum loan-to-cost, percent
    pub max_ltc_percent: f64,

    /// Extra per-field bounds
    pub field_bounds: BTreeMap<FieldId, FieldBounds>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_types: true,
            validate_ranges: true,
            validate_policy: true,
            validate_divergence: false,
            max_ltv_percent: 80.0,
            max_ltc_percent: 85.0,
            field_bounds: BTreeMap::new(),
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (type checks only)
    pub fn permissive() -> Self {
        Self {
            validate_types: true,
            validate_ranges: false,
            validate_policy: false,
            validate_divergence: false,
            ..Self::default()
        }
    }

    /// Create a strict configuration (all validations enabled, tighter policy)
    pub fn strict() -> Self {
        Self {
            validate_types: true,
            validate_ranges: true,
            validate_policy: true,
            validate_divergence: true,
            max_ltv_percent: 75.0,
            max_ltc_percent: 80.0,
            field_bounds: BTreeMap::new(),
        }
    }

    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml(text: &str) -> Result<Self, GatekeeperError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GatekeeperError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<(), GatekeeperError> {
        for (name, value) in [
            ("max_ltv_percent", self.max_ltv_percent),
            ("max_ltc_percent", self.max_ltc_percent),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(GatekeeperError::Config(format!(
                    "{} must be in (0, 100], got {}",
                    name, value
                )));
            }
        }
        for (field, bounds) in &self.field_bounds {
            if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
                if min > max {
                    return Err(GatekeeperError::Config(format!(
                        "Bounds for '{}' are inverted: {} > {}",
                        field, min, max
                    )));
                }
            }
        }
        Ok(())
    }
}
