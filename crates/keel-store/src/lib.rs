//! Keel Storage Layer
//!
//! Durable and ephemeral storage for editing sessions.
//!
//! # Architecture
//!
//! - [`SqliteVersionStore`]: versioned record history in SQLite with a
//!   per-record pointer to the current version. Implements
//!   [`PersistenceProvider`](keel_domain::PersistenceProvider).
//! - [`FileDraftStore`] / [`MemoryDraftStore`]: local recovery drafts.
//!   Implement [`DraftStore`](keel_domain::DraftStore).
//!
//! # Examples
//!
//! ```no_run
//! use keel_domain::{RecordId, SaveOptions, Snapshot};
//! use keel_store::SqliteVersionStore;
//!
//! let store = SqliteVersionStore::new("keel.db").unwrap();
//! let record = RecordId::new();
//! let version = store.write(record, &Snapshot::new(), SaveOptions::new_version()).unwrap();
//! assert_eq!(store.latest(record).unwrap().unwrap().id, version);
//! ```

#![warn(missing_docs)]

pub mod drafts;
pub mod error;
pub mod sqlite;

pub use drafts::{FileDraftStore, MemoryDraftStore};
pub use error::StoreError;
pub use sqlite::{SqliteVersionStore, StoredVersion, VersionSummary};
