//! Gatekeeper error types

use thiserror::Error;

/// Errors that can occur during gatekeeper operations
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Field is not declared in the registry
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration TOML could not be parsed
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}
