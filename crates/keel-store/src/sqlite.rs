//! SQLite-backed version store
//!
//! Each record has a numbered history of versions and a pointer to the
//! current one. A new-version write appends and moves the pointer; a
//! maintenance write rewrites the current version in place.

use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel_domain::{PersistenceProvider, RecordId, SaveOptions, Snapshot, VersionId};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// One persisted version with its content
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVersion {
    /// Version identifier
    pub id: VersionId,
    /// Record the version belongs to
    pub record: RecordId,
    /// 1-based position in the record's history
    pub version_number: u32,
    /// When the version was appended
    pub created_at: DateTime<Utc>,
    /// Last in-place rewrite (equals `created_at` if never rewritten)
    pub updated_at: DateTime<Utc>,
    /// Persisted snapshot
    pub snapshot: Snapshot,
}

/// History entry without the full content
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSummary {
    /// Version identifier
    pub id: VersionId,
    /// 1-based position in the record's history
    pub version_number: u32,
    /// When the version was appended
    pub created_at: DateTime<Utc>,
    /// Last in-place rewrite
    pub updated_at: DateTime<Utc>,
    /// Whether the record's pointer resolves to this version
    pub is_current: bool,
}

/// Raw row before id and content decoding
struct VersionRow {
    id: Vec<u8>,
    record: Vec<u8>,
    version_number: i64,
    content: String,
    created_at: i64,
    updated_at: i64,
}

/// SQLite implementation of [`PersistenceProvider`]
///
/// The connection sits behind a mutex so the store can be shared between a
/// session and its spawned save tasks. Writes are short and never await
/// while holding the lock.
pub struct SqliteVersionStore {
    conn: Mutex<Connection>,
}

impl SqliteVersionStore {
    /// Open (or create) a store at `path`
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Persist `snapshot` for `record`
    ///
    /// With `create_new_version` a numbered version is appended and becomes
    /// current. Without it the current version is rewritten in place, or the
    /// first version is created if the record has none. `keepalive` has no
    /// meaning for a local database and is ignored.
    pub fn write(
        &self,
        record: RecordId,
        snapshot: &Snapshot,
        options: SaveOptions,
    ) -> Result<VersionId, StoreError> {
        let content = serde_json::to_string(snapshot)?;
        let now = Utc::now().timestamp_millis();
        let record_bytes = id_to_bytes(record.value());

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current: Option<Vec<u8>> = tx
            .query_row(
                "SELECT version_id FROM current_versions WHERE record_id = ?1",
                params![&record_bytes],
                |row| row.get(0),
            )
            .optional()?;

        let id = match current {
            Some(bytes) if !options.create_new_version => {
                tx.execute(
                    "UPDATE record_versions SET content = ?1, updated_at = ?2 WHERE id = ?3",
                    params![&content, now, &bytes],
                )?;
                let id = VersionId::from_value(bytes_to_id(&bytes)?);
                debug!(record = %record, version = %id, "Current version rewritten in place");
                id
            }
            _ => append_version(&tx, &record_bytes, &content, now)?,
        };

        tx.commit()?;
        Ok(id)
    }

    /// Current version of a record
    pub fn latest(&self, record: RecordId) -> Result<Option<StoredVersion>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT v.id, v.record_id, v.version_number, v.content, v.created_at, v.updated_at
                 FROM current_versions c JOIN record_versions v ON v.id = c.version_id
                 WHERE c.record_id = ?1",
                params![id_to_bytes(record.value())],
                read_row,
            )
            .optional()?;
        row.map(decode_row).transpose()
    }

    /// A specific version
    pub fn version(&self, id: VersionId) -> Result<Option<StoredVersion>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, record_id, version_number, content, created_at, updated_at
                 FROM record_versions WHERE id = ?1",
                params![id_to_bytes(id.value())],
                read_row,
            )
            .optional()?;
        row.map(decode_row).transpose()
    }

    /// Version history of a record, newest first
    pub fn history(&self, record: RecordId) -> Result<Vec<VersionSummary>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT v.id, v.version_number, v.created_at, v.updated_at,
                    c.version_id IS NOT NULL
             FROM record_versions v
             LEFT JOIN current_versions c ON c.version_id = v.id
             WHERE v.record_id = ?1
             ORDER BY v.version_number DESC",
        )?;

        let rows = stmt
            .query_map(params![id_to_bytes(record.value())], |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, number, created, updated, is_current)| {
                Ok(VersionSummary {
                    id: VersionId::from_value(bytes_to_id(&id)?),
                    version_number: version_number(number)?,
                    created_at: timestamp(created)?,
                    updated_at: timestamp(updated)?,
                    is_current,
                })
            })
            .collect()
    }

    /// Every record with at least one version
    pub fn records(&self) -> Result<Vec<RecordId>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT record_id FROM current_versions ORDER BY record_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids.iter()
            .map(|bytes| bytes_to_id(bytes).map(RecordId::from_value))
            .collect()
    }
}

#[async_trait]
impl PersistenceProvider for SqliteVersionStore {
    type Error = StoreError;

    async fn save(
        &self,
        record: RecordId,
        snapshot: &Snapshot,
        options: SaveOptions,
    ) -> Result<VersionId, Self::Error> {
        self.write(record, snapshot, options)
    }
}

fn append_version(
    tx: &Transaction<'_>,
    record_bytes: &[u8],
    content: &str,
    now: i64,
) -> Result<VersionId, StoreError> {
    let next: i64 = tx.query_row(
        "SELECT COALESCE(MAX(version_number), 0) + 1 FROM record_versions WHERE record_id = ?1",
        params![record_bytes],
        |row| row.get(0),
    )?;

    let id = VersionId::new();
    let id_bytes = id_to_bytes(id.value());
    tx.execute(
        "INSERT INTO record_versions (id, record_id, version_number, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id_bytes, record_bytes, next, content, now],
    )?;
    tx.execute(
        "INSERT INTO current_versions (record_id, version_id) VALUES (?1, ?2)
         ON CONFLICT(record_id) DO UPDATE SET version_id = excluded.version_id",
        params![record_bytes, &id_bytes],
    )?;

    debug!(version = %id, number = next, "Version appended");
    Ok(id)
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: row.get(0)?,
        record: row.get(1)?,
        version_number: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn decode_row(row: VersionRow) -> Result<StoredVersion, StoreError> {
    Ok(StoredVersion {
        id: VersionId::from_value(bytes_to_id(&row.id)?),
        record: RecordId::from_value(bytes_to_id(&row.record)?),
        version_number: version_number(row.version_number)?,
        created_at: timestamp(row.created_at)?,
        updated_at: timestamp(row.updated_at)?,
        snapshot: serde_json::from_str(&row.content)?,
    })
}

fn id_to_bytes(id: u128) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
    let arr: [u8; 16] = bytes.try_into().map_err(|_| {
        StoreError::InvalidData(format!("Expected 16 bytes for id, got {}", bytes.len()))
    })?;
    Ok(u128::from_be_bytes(arr))
}

fn version_number(n: i64) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|_| StoreError::InvalidData(format!("Bad version number: {}", n)))
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("Bad timestamp: {}", millis)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_domain::{FieldId, FieldValue};

    fn snapshot_with(field: &str, n: i64) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.record_user_edit(&FieldId::from(field), Some(FieldValue::Integer(n)));
        snapshot
    }

    #[test]
    fn test_id_bytes_roundtrip() {
        let id = VersionId::new();
        let bytes = id_to_bytes(id.value());
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_id(&bytes).unwrap(), id.value());
        assert!(bytes_to_id(&bytes[..8]).is_err());
    }

    #[test]
    fn test_maintenance_write_creates_first_version() {
        let store = SqliteVersionStore::new(":memory:").unwrap();
        let record = RecordId::new();

        let id = store
            .write(record, &snapshot_with("units", 4), SaveOptions::maintenance())
            .unwrap();

        let history = store.history(record).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].version_number, 1);
        assert!(history[0].is_current);
    }

    #[test]
    fn test_maintenance_write_rewrites_in_place() {
        let store = SqliteVersionStore::new(":memory:").unwrap();
        let record = RecordId::new();

        let first = store
            .write(record, &snapshot_with("units", 4), SaveOptions::new_version())
            .unwrap();
        let rewritten = store
            .write(record, &snapshot_with("units", 5), SaveOptions::maintenance())
            .unwrap();

        assert_eq!(first, rewritten);
        assert_eq!(store.history(record).unwrap().len(), 1);
        let latest = store.latest(record).unwrap().unwrap();
        assert_eq!(latest.snapshot, snapshot_with("units", 5));
    }
}
