//! Keel Domain Layer
//!
//! This crate holds the field provenance model for one editable record: what
//! each field holds, where the value came from, whether it is locked against
//! automated overwrite and how it should be presented. Everything here is
//! synchronous and side-effect free; scheduling, persistence and I/O live in
//! the crates that depend on this one.
//!
//! ## Key Concepts
//!
//! - **Field Registry**: static description of every field (type, required flag,
//!   sections, dependency graph, derived ratios)
//! - **Field Value**: a closed tagged union, one variant per declared data type
//! - **Provenance**: per-field source, warnings and alternate values
//! - **Lock Set**: fields frozen against automated overwrite
//! - **Snapshot**: the owned (values, provenance, locks) aggregate compared
//!   against the persisted baseline
//! - **Field State**: the White/Blue/Green/Red decision table
//!
//! ## Architecture
//!
//! - Pure state transitions on [`Snapshot`]
//! - Trait definitions for the collaborators at the engine boundary
//!   (consistency checks, durable persistence, local drafts)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod ids;
pub mod lock;
pub mod merge;
pub mod provenance;
pub mod registry;
pub mod snapshot;
pub mod source;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use classify::{classify, FieldState};
pub use error::DomainError;
pub use ids::{RecordId, VersionId};
pub use lock::{LockOutcome, LockRejection, LockSet, SectionLockOutcome};
pub use merge::{merge_rich_content, MergeOutcome};
pub use provenance::{AlternateValue, EditEffect, FieldProvenance};
pub use registry::{DerivedField, FieldId, FieldRegistry, FieldSpec, RegistryBuilder, Section};
pub use snapshot::Snapshot;
pub use source::Source;
pub use traits::{ConsistencyChecker, DraftStore, PersistenceProvider, SaveOptions};
pub use value::{DataType, FieldValue};
