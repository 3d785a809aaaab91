//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Field registry or value error
    #[error("{0}")]
    Domain(#[from] keel_domain::DomainError),

    /// Storage error
    #[error("Store error: {0}")]
    Store(#[from] keel_store::StoreError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] keel_session::SessionError),

    /// Consistency check error
    #[error("Check error: {0}")]
    Gatekeeper(#[from] keel_gatekeeper::GatekeeperError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record has no stored version
    #[error("Record not found: {0}")]
    NotFound(String),
}
