//! Integration tests for the version ledger's one-current invariant.

use chrono::{DateTime, TimeZone, Utc};
use signoff::core::db::db_connect;
use signoff::core::error::SignoffError;
use signoff::core::governance::Repository;
use signoff::core::repository::{governance_db_path, initialize_governance_db, SqliteRepository};
use signoff::core::store::Store;
use signoff::core::version::{next_version, ChangeKind, VersionInput};
use signoff::plugins::lifecycle::register_report;
use signoff::plugins::version::add_version;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    initialize_governance_db(&root).unwrap();
    (tmp, Store::new(root))
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

fn input(major: u32, minor: u32, patch: u32, kind: ChangeKind) -> VersionInput<'static> {
    VersionInput {
        major,
        minor,
        patch,
        change_kind: kind,
        created_by: "release-bot",
        notes: None,
    }
}

#[test]
fn test_repeated_adds_keep_exactly_one_current() {
    let (_tmp, store) = test_store();
    register_report(&store, "RPT-1", now()).unwrap();

    for i in 0..8u32 {
        add_version(&store, "RPT-1", input(1, i, 0, ChangeKind::Minor), now()).unwrap();
    }

    let record = SqliteRepository::new(&store.root).load("RPT-1").unwrap();
    let currents: Vec<_> = record
        .versions
        .versions
        .iter()
        .filter(|v| v.current)
        .collect();
    assert_eq!(record.versions.versions.len(), 8);
    assert_eq!(currents.len(), 1);
    assert_eq!(currents[0].minor, 7);
    assert_eq!(record.versions.current_display, "v1.7.0");
    assert!(record.versions.verify_consistency().is_ok());
}

#[test]
fn test_pointer_fields_follow_the_latest_add() {
    let (_tmp, store) = test_store();
    register_report(&store, "RPT-1", now()).unwrap();
    add_version(&store, "RPT-1", input(1, 0, 0, ChangeKind::Major), now()).unwrap();
    add_version(&store, "RPT-1", input(2, 0, 0, ChangeKind::Major), now()).unwrap();

    let record = SqliteRepository::new(&store.root).load("RPT-1").unwrap();
    assert_eq!(record.versions.current_major, 2);
    assert_eq!(record.versions.current().unwrap().display(), "v2.0.0");
}

#[test]
fn test_caller_side_bump_mapping() {
    let (_tmp, store) = test_store();
    register_report(&store, "RPT-1", now()).unwrap();
    add_version(&store, "RPT-1", input(2, 3, 4, ChangeKind::Major), now()).unwrap();

    let record = SqliteRepository::new(&store.root).load("RPT-1").unwrap();
    assert_eq!(next_version(&record.versions, ChangeKind::Major), (3, 0, 0));
    assert_eq!(next_version(&record.versions, ChangeKind::Minor), (2, 4, 0));
    assert_eq!(next_version(&record.versions, ChangeKind::Hotfix), (2, 3, 5));
}

#[test]
fn test_corrupted_current_flags_surface_as_fatal() {
    let (_tmp, store) = test_store();
    register_report(&store, "RPT-1", now()).unwrap();
    add_version(&store, "RPT-1", input(1, 0, 0, ChangeKind::Major), now()).unwrap();
    add_version(&store, "RPT-1", input(1, 0, 1, ChangeKind::Patch), now()).unwrap();

    // Violate the invariant behind the repository's back.
    let conn = db_connect(&governance_db_path(&store.root).to_string_lossy()).unwrap();
    conn.execute("UPDATE versions SET is_current = 1", []).unwrap();

    let result = SqliteRepository::new(&store.root).load("RPT-1");
    assert!(matches!(result, Err(SignoffError::VersionConsistency(_))));
}

#[test]
fn test_version_rows_keep_change_kind_and_notes() {
    let (_tmp, store) = test_store();
    register_report(&store, "RPT-1", now()).unwrap();
    add_version(
        &store,
        "RPT-1",
        VersionInput {
            major: 1,
            minor: 0,
            patch: 1,
            change_kind: ChangeKind::Hotfix,
            created_by: "alice",
            notes: Some("late-night fix"),
        },
        now(),
    )
    .unwrap();

    let record = SqliteRepository::new(&store.root).load("RPT-1").unwrap();
    let v = record.versions.current().unwrap();
    assert_eq!(v.change_kind, ChangeKind::Hotfix);
    assert_eq!(v.created_by, "alice");
    assert_eq!(v.notes.as_deref(), Some("late-night fix"));
}
