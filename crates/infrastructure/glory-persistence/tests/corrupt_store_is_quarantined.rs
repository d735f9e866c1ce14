use camino::Utf8PathBuf;
use glory_persistence::{DbState, RedbScopeStore, ScopeBackend, StorageError};

#[test]
fn corrupt_store_is_quarantined_and_recovery_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let db_path = root.join("flags.redb");

    std::fs::write(&db_path, b"definitely-not-a-redb-database").unwrap();
    assert_eq!(RedbScopeStore::validate(&db_path).unwrap(), DbState::Corrupt);

    assert!(!db_path.exists());
    let quarantines: Vec<_> = std::fs::read_dir(&root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with("flags.redb.corrupt."))
        .collect();
    assert_eq!(quarantines.len(), 1, "expected exactly one quarantine");

    let store = RedbScopeStore::open(db_path.clone()).unwrap();
    assert!(store.keys().unwrap().is_empty());
    store.set("currentDraftId", "42").unwrap();
    assert!(db_path.exists());
}

#[test]
fn open_or_recover_replaces_garbage_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let db_path = root.join("flags.redb");
    std::fs::write(&db_path, b"garbage").unwrap();

    match RedbScopeStore::open(db_path.clone()) {
        Err(StorageError::Corrupt) => {}
        other => panic!("expected corrupt, got {other:?}"),
    }

    let store = RedbScopeStore::open_or_recover(db_path).unwrap();
    assert_eq!(store.get("activeSection").unwrap(), None);
}
