//! Local draft envelope
//!
//! A draft carries the record id it was written for, so a payload found under
//! the wrong key is never restored into another record.

use chrono::{DateTime, Utc};
use keel_domain::{RecordId, Snapshot};
use serde::{Deserialize, Serialize};

/// Serialized form of a local draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftEnvelope {
    /// Record the draft belongs to
    pub record: RecordId,
    /// When the draft was written
    pub saved_at: DateTime<Utc>,
    /// Unsaved working snapshot
    pub snapshot: Snapshot,
}

impl DraftEnvelope {
    /// Wrap a snapshot, stamped now
    pub fn new(record: RecordId, snapshot: Snapshot) -> Self {
        Self {
            record,
            saved_at: Utc::now(),
            snapshot,
        }
    }

    /// Encode as JSON
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from JSON
    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
