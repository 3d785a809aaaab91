//! Error types for revalidation

use thiserror::Error;

/// Errors that can occur while configuring revalidation
#[derive(Error, Debug)]
pub enum RevalidatorError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration TOML could not be parsed
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}
