//! Error types for editing sessions

use keel_domain::DomainError;
use keel_revalidator::RevalidatorError;
use thiserror::Error;

/// Session operation errors
///
/// Lock rejections are not errors; see [`keel_domain::LockOutcome`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Field registry or value error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Section id not declared in the registry
    #[error("Unknown section: {0}")]
    UnknownSection(String),

    /// Durable save failed; the session stays dirty and its draft is kept
    #[error("Persist failed: {0}")]
    Persist(String),

    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid revalidation configuration
    #[error(transparent)]
    Revalidator(#[from] RevalidatorError),

    /// Configuration file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
