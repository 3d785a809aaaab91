//! Keel Gatekeeper
//!
//! Consistency checks for record fields.
//!
//! The Gatekeeper provides:
//! - Type checks against the field registry
//! - Range checks (percentages, non-negative amounts, configured bounds)
//! - Lending policy checks (LTV/LTC maxima and the loan limits they imply)
//! - Optional divergence warnings against externally proposed values
//!
//! It implements [`keel_domain::ConsistencyChecker`], so the revalidator can
//! drive it directly.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use keel_gatekeeper::{lending, Gatekeeper, ValidationConfig};
//!
//! let registry = Arc::new(lending::lending_registry().unwrap());
//! let gatekeeper = Gatekeeper::new(ValidationConfig::default(), registry);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
pub mod lending;
mod validator;

pub use config::{FieldBounds, ValidationConfig};
pub use error::GatekeeperError;
pub use validator::{ConsistencyIssue, Gatekeeper, ValidationResult};
