//! Keel Editing Sessions
//!
//! Ties the provenance model, the revalidator and the storage collaborators
//! into one editing session per record, and reconciles the concurrent edit
//! streams (user input, autofill, debounced checks, local drafts, explicit and
//! implicit saves) into persisted versions without losing work or writing
//! duplicate history.
//!
//! # Example
//!
//! ```no_run
//! use keel_domain::{FieldId, FieldValue, RecordId, Snapshot};
//! use keel_gatekeeper::{lending::lending_registry, Gatekeeper};
//! use keel_session::{Collaborators, EditSession, SessionConfig};
//! use keel_store::{MemoryDraftStore, SqliteVersionStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(lending_registry()?);
//! let collaborators = Collaborators {
//!     persistence: Arc::new(SqliteVersionStore::new("keel.db")?),
//!     drafts: MemoryDraftStore::new(),
//!     checker: Arc::new(Gatekeeper::default_config(Arc::clone(&registry))),
//! };
//!
//! let mut session = EditSession::open(
//!     SessionConfig::default(),
//!     RecordId::new(),
//!     registry,
//!     collaborators,
//!     Snapshot::new(),
//! )?;
//! session.record_user_edit(
//!     &FieldId::from("loanAmountRequested"),
//!     Some(FieldValue::Currency(1_800_000.0)),
//! )?;
//! session.settle().await;
//! session.save().await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod draft;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use draft::DraftEnvelope;
pub use error::SessionError;
pub use session::{
    CloseOutcome, Collaborators, EditSession, SaveOutcome, SaveTicket, SessionEvent,
};
