//! Domain error types

use crate::value::DataType;
use thiserror::Error;

/// Errors raised while building registries or converting values
#[derive(Error, Debug)]
pub enum DomainError {
    /// Field is not declared in the registry
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Incoming value does not fit the field's declared type
    #[error("Field '{field}' expects a {expected} value, got {found}")]
    TypeMismatch {
        /// Field being converted
        field: String,
        /// Declared data type
        expected: DataType,
        /// Short description of what was received
        found: String,
    },

    /// Value could not be parsed (bad number, bad date, non-finite float)
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field being converted
        field: String,
        /// What went wrong
        reason: String,
    },

    /// Registry definition is inconsistent
    #[error("Registry error: {0}")]
    Registry(String),

    /// Registry TOML could not be parsed
    #[error("Failed to parse registry TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Rich content was not shaped as expected
    #[error("Malformed content: {0}")]
    MalformedContent(String),
}
