//! Integration tests for keel-store
//!
//! These tests verify version history, the current-version pointer and the
//! draft stores against real files.

use keel_domain::{
    DraftStore, FieldId, FieldValue, PersistenceProvider, RecordId, SaveOptions, Snapshot,
};
use keel_store::{FileDraftStore, SqliteVersionStore, StoreError};

fn snapshot(loan: f64) -> Snapshot {
    let mut snapshot = Snapshot::new();
    snapshot.record_user_edit(&FieldId::from("loanAmountRequested"), Some(FieldValue::Currency(loan)));
    snapshot
}

#[test]
fn test_store_initialization() {
    let store = SqliteVersionStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_new_versions_append_and_move_pointer() {
    let store = SqliteVersionStore::new(":memory:").unwrap();
    let record = RecordId::new();

    let v1 = store.write(record, &snapshot(1_000_000.0), SaveOptions::new_version()).unwrap();
    let v2 = store.write(record, &snapshot(1_800_000.0), SaveOptions::new_version()).unwrap();
    assert_ne!(v1, v2);

    let history = store.history(record).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, v2);
    assert_eq!(history[0].version_number, 2);
    assert!(history[0].is_current);
    assert_eq!(history[1].id, v1);
    assert!(!history[1].is_current);

    let latest = store.latest(record).unwrap().unwrap();
    assert_eq!(latest.id, v2);
    assert_eq!(latest.record, record);
    assert_eq!(latest.snapshot, snapshot(1_800_000.0));

    let old = store.version(v1).unwrap().unwrap();
    assert_eq!(old.snapshot, snapshot(1_000_000.0));
}

#[test]
fn test_records_are_isolated() {
    let store = SqliteVersionStore::new(":memory:").unwrap();
    let a = RecordId::new();
    let b = RecordId::new();

    store.write(a, &snapshot(1.0), SaveOptions::new_version()).unwrap();
    store.write(b, &snapshot(2.0), SaveOptions::new_version()).unwrap();
    store.write(b, &snapshot(3.0), SaveOptions::new_version()).unwrap();

    assert_eq!(store.history(a).unwrap().len(), 1);
    assert_eq!(store.history(b).unwrap().len(), 2);
    assert_eq!(store.records().unwrap().len(), 2);
    assert!(store.latest(RecordId::new()).unwrap().is_none());
}

#[test]
fn test_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keel.db");
    let record = RecordId::new();

    {
        let store = SqliteVersionStore::new(&path).unwrap();
        store.write(record, &snapshot(42.0), SaveOptions::new_version()).unwrap();
    }

    let store = SqliteVersionStore::new(&path).unwrap();
    let latest = store.latest(record).unwrap().unwrap();
    assert_eq!(latest.snapshot, snapshot(42.0));
}

#[tokio::test]
async fn test_persistence_provider_honours_options() {
    let store = SqliteVersionStore::new(":memory:").unwrap();
    let record = RecordId::new();

    let v1 = store.save(record, &snapshot(1.0), SaveOptions::new_version()).await.unwrap();
    let v1_again = store.save(record, &snapshot(2.0), SaveOptions::maintenance()).await.unwrap();
    let v2 = store.save(record, &snapshot(3.0), SaveOptions::teardown()).await.unwrap();

    assert_eq!(v1, v1_again);
    assert_ne!(v1, v2);
    assert_eq!(store.history(record).unwrap().len(), 2);
    assert_eq!(store.version(v1).unwrap().unwrap().snapshot, snapshot(2.0));
}

#[test]
fn test_file_drafts_lifecycle() -> Result<(), StoreError> {
    let dir = tempfile::tempdir()?;
    let mut drafts = FileDraftStore::new(dir.path().join("drafts"))?;

    assert_eq!(drafts.get("draft:one")?, None);
    drafts.put("draft:one", "first")?;
    drafts.put("draft:one", "second")?;
    drafts.put("draft:two", "other")?;

    assert_eq!(drafts.get("draft:one")?.as_deref(), Some("second"));
    assert_eq!(drafts.keys()?, vec!["draft_one".to_string(), "draft_two".to_string()]);

    drafts.remove("draft:one")?;
    drafts.remove("draft:one")?;
    assert_eq!(drafts.get("draft:one")?, None);

    assert_eq!(drafts.clear()?, 1);
    assert!(drafts.keys()?.is_empty());
    Ok(())
}
