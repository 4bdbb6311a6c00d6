// Snapshot store integration tests: creation, integrity validation,
// tamper detection, restore semantics, and pruning.

use netforge_store::{ConfigStore, SnapshotStore};
use std::fs;
use tempfile::TempDir;

const NETWORK: &str = "config interface 'wan'\n\toption 'proto' 'static'\n\toption 'ipaddr' '192.168.1.1'\n";
const FIREWALL: &str = "config defaults\n\toption 'input' 'accept'\n";

fn setup() -> (SnapshotStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let active = temp_dir.path().join("config");
    fs::create_dir_all(&active).unwrap();
    fs::write(active.join("network"), NETWORK).unwrap();
    fs::write(active.join("firewall"), FIREWALL).unwrap();

    let store = SnapshotStore::new(temp_dir.path().join("snapshots"), active)
        .with_min_free_bytes(0);
    (store, temp_dir)
}

fn configs(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_create_copies_files_and_records_checksums() {
    let (store, _dir) = setup();

    let snapshot = store
        .create("before upgrade", &configs(&["network", "firewall"]))
        .unwrap();

    assert_eq!(
        snapshot.metadata.configs,
        vec!["network".to_string(), "firewall".to_string()]
    );
    assert_eq!(
        fs::read_to_string(snapshot.path.join("network")).unwrap(),
        NETWORK
    );
    assert_eq!(snapshot.metadata.checksums.len(), 2);
    assert_eq!(snapshot.metadata.message, "before upgrade");
    store.validate(&snapshot).unwrap();
}

#[test]
fn test_create_skips_missing_sources() {
    let (store, _dir) = setup();

    let snapshot = store
        .create("partial", &configs(&["network", "dhcp"]))
        .unwrap();

    assert_eq!(snapshot.metadata.configs, vec!["network".to_string()]);
    assert!(!snapshot.metadata.checksums.contains_key("dhcp"));
}

#[test]
fn test_create_rejects_when_space_floor_unmet() {
    let temp_dir = TempDir::new().unwrap();
    let active = temp_dir.path().join("config");
    fs::create_dir_all(&active).unwrap();

    let store = SnapshotStore::new(temp_dir.path().join("snapshots"), active)
        .with_min_free_bytes(u64::MAX);

    let err = store.create("no room", &configs(&["network"])).unwrap_err();
    assert_eq!(err.code(), "ERR_NO_SPACE");
}

#[test]
fn test_list_sorted_newest_first_and_skips_malformed() {
    let (store, dir) = setup();

    let first = store.create("first", &configs(&["network"])).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = store.create("second", &configs(&["network"])).unwrap();

    // A stray directory without metadata must not break listing
    fs::create_dir_all(dir.path().join("snapshots").join("not-a-snapshot")).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
    assert_eq!(store.latest().unwrap().unwrap().id, second.id);
}

#[test]
fn test_load_missing_snapshot() {
    let (store, _dir) = setup();
    let err = store.load("20200101-000000-000-dead").unwrap_err();
    assert_eq!(err.code(), "ERR_NOT_FOUND");
}

#[test]
fn test_tampered_content_detected_as_corrupt() {
    let (store, _dir) = setup();

    let snapshot = store.create("pristine", &configs(&["network"])).unwrap();
    fs::write(snapshot.path.join("network"), "config interface 'wan'\n").unwrap();

    let err = store.validate(&snapshot).unwrap_err();
    assert_eq!(err.code(), "ERR_CORRUPT");
}

#[test]
fn test_missing_file_detected_as_corrupt() {
    let (store, _dir) = setup();

    let snapshot = store.create("pristine", &configs(&["network"])).unwrap();
    fs::remove_file(snapshot.path.join("network")).unwrap();

    let err = store.validate(&snapshot).unwrap_err();
    assert_eq!(err.code(), "ERR_CORRUPT");
}

#[test]
fn test_restore_of_corrupt_snapshot_leaves_active_unchanged() {
    let (store, dir) = setup();
    let active_network = dir.path().join("config").join("network");

    let snapshot = store.create("pristine", &configs(&["network"])).unwrap();

    // Tamper, then change the active copy so a partial restore would show
    let live = "config interface 'wan'\n\toption 'proto' 'dhcp'\n";
    fs::write(snapshot.path.join("network"), "garbage that will not parse").unwrap();
    fs::write(&active_network, live).unwrap();

    let err = store.restore(&snapshot.id).unwrap_err();
    assert_eq!(err.code(), "ERR_CORRUPT");
    assert_eq!(fs::read_to_string(&active_network).unwrap(), live);
}

#[test]
fn test_restore_brings_back_snapshotted_content() {
    let (store, dir) = setup();
    let active_network = dir.path().join("config").join("network");

    let snapshot = store.create("pre-change", &configs(&["network"])).unwrap();
    fs::write(&active_network, "config interface 'wan'\n\toption 'proto' 'dhcp'\n").unwrap();

    store.restore(&snapshot.id).unwrap();
    assert_eq!(fs::read_to_string(&active_network).unwrap(), NETWORK);
}

#[test]
fn test_delete_then_load_fails() {
    let (store, _dir) = setup();

    let snapshot = store.create("doomed", &configs(&["network"])).unwrap();
    store.delete(&snapshot.id).unwrap();

    assert!(store.load(&snapshot.id).is_err());
    // Deleting again is a no-op
    store.delete(&snapshot.id).unwrap();
}

#[test]
fn test_prune_keeps_most_recent_by_timestamp() {
    let (store, _dir) = setup();

    for i in 0..120 {
        store.create(&format!("s{i}"), &configs(&["network"])).unwrap();
    }

    let before = store.list().unwrap();
    let expected_kept: Vec<String> = before.iter().take(30).map(|s| s.id.clone()).collect();

    let deleted = store.prune(30).unwrap();
    assert_eq!(deleted.len(), 90);

    let after = store.list().unwrap();
    assert_eq!(after.len(), 30);
    let kept: Vec<String> = after.iter().map(|s| s.id.clone()).collect();
    assert_eq!(kept, expected_kept);
}

#[test]
fn test_prune_below_threshold_deletes_nothing() {
    let (store, _dir) = setup();

    store.create("only", &configs(&["network"])).unwrap();
    assert!(store.prune(5).unwrap().is_empty());
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn test_snapshot_round_trips_through_config_store() {
    // A snapshot taken from one store restores into an active directory a
    // ConfigStore can read back identically.
    let (store, dir) = setup();
    let active = dir.path().join("config");

    let snapshot = store.create("round trip", &configs(&["network"])).unwrap();
    fs::remove_file(active.join("network")).unwrap();

    store.restore(&snapshot.id).unwrap();

    let config_store = ConfigStore::new(&active);
    assert_eq!(
        config_store.get("network.wan.ipaddr").unwrap(),
        "192.168.1.1"
    );
}
