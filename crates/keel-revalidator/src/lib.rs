//! Keel Revalidator
//!
//! Debounced, dependency-driven consistency checking for one editing session.
//!
//! # Overview
//!
//! The revalidator is responsible for:
//! - **Change detection**: diffing tracked fields against the values seen by
//!   the last validation pass
//! - **Scheduling**: one cancellable debounce timer per (purpose, field)
//! - **Dependent batches**: re-checking the transitive dependents of a field
//!   once its own check completes
//! - **Stale-result suppression**: dropping results overtaken by a newer check
//! - **Metrics collection**: counting scheduled, superseded and failed checks
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use keel_domain::{FieldValue, Snapshot};
//! use keel_gatekeeper::{lending, Gatekeeper, ValidationConfig};
//! use keel_revalidator::{Revalidator, RevalidatorConfig, Scheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(lending::lending_registry()?);
//!     let checker = Arc::new(Gatekeeper::new(ValidationConfig::default(), registry.clone()));
//!     let mut revalidator = Revalidator::new(RevalidatorConfig::default(), registry, checker);
//!     let mut scheduler = Scheduler::new();
//!
//!     let mut snapshot = Snapshot::new();
//!     let field = lending::TARGET_LTV.into();
//!     snapshot.record_user_edit(&field, Some(FieldValue::Percent(90.0)));
//!     revalidator.observe(&snapshot, &[field.clone()], &mut scheduler);
//!     revalidator.run_until_idle(&mut snapshot, &mut scheduler).await;
//!
//!     println!("{:?}", snapshot.warnings(&field));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod metrics;
mod revalidator;
mod scheduler;

pub use config::RevalidatorConfig;
pub use error::RevalidatorError;
pub use metrics::RevalidationMetrics;
pub use revalidator::{CheckCompletion, CheckKind, RevalidationState, Revalidator};
pub use scheduler::{Scheduler, TaskKey, TaskPurpose};
