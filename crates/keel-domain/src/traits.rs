//! Trait definitions for the engine's collaborators
//!
//! These traits define the boundaries between the editing engine and the
//! infrastructure around it. Implementations live in other crates
//! (keel-gatekeeper, keel-store).

use crate::ids::{RecordId, VersionId};
use crate::provenance::FieldProvenance;
use crate::registry::FieldId;
use crate::snapshot::Snapshot;
use crate::value::FieldValue;
use async_trait::async_trait;
use std::fmt::Display;

/// Consistency-check provider
///
/// Implemented by keel-gatekeeper
#[async_trait]
pub trait ConsistencyChecker: Send + Sync {
    /// Error type for check failures
    type Error: Display + Send;

    /// Return the warnings that currently apply to `field`
    ///
    /// An empty list means no known problem. An error means "no new
    /// information"; callers keep the previous warnings.
    async fn check(
        &self,
        field: &FieldId,
        value: Option<&FieldValue>,
        record: &Snapshot,
        existing: Option<&FieldProvenance>,
    ) -> Result<Vec<String>, Self::Error>;
}

/// Options for one durable write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Append a version to history instead of rewriting the current one
    pub create_new_version: bool,
    /// Write must survive the caller going away before a response arrives
    pub keepalive: bool,
}

impl SaveOptions {
    /// Explicit save: a new version
    pub fn new_version() -> Self {
        Self {
            create_new_version: true,
            keepalive: false,
        }
    }

    /// Maintenance write: rewrite the current version in place
    pub fn maintenance() -> Self {
        Self {
            create_new_version: false,
            keepalive: false,
        }
    }

    /// Implicit save on session teardown
    pub fn teardown() -> Self {
        Self {
            create_new_version: true,
            keepalive: true,
        }
    }
}

/// Durable persistence provider
///
/// Implemented by the infrastructure layer (keel-store)
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    /// Error type for persistence operations
    type Error: Display + Send;

    /// Persist a snapshot, returning the id of the version written
    async fn save(
        &self,
        record: RecordId,
        snapshot: &Snapshot,
        options: SaveOptions,
    ) -> Result<VersionId, Self::Error>;
}

/// Local ephemeral draft store
///
/// Same-device recovery cache keyed by record identity. Payloads are opaque
/// strings so a corrupt entry can be detected by the reader.
///
/// Implemented by the infrastructure layer (keel-store)
pub trait DraftStore: Send {
    /// Error type for draft operations
    type Error: Display;

    /// Store a payload under `key`, replacing any previous one
    fn put(&mut self, key: &str, payload: &str) -> Result<(), Self::Error>;

    /// Read the payload stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Remove the payload stored under `key`
    fn remove(&mut self, key: &str) -> Result<(), Self::Error>;
}
