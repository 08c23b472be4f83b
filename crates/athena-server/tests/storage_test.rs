//! Storage backend tests
//!
//! Every behavior test runs against both backends; the Redb tests also check
//! that records survive reopening the file.

use athena_server::{
    MemoryStorage, RedbStorage, Storage, StorageError,
    storage::{NewBan, UserRecord, Warning},
};
use tempfile::TempDir;

fn ban(ipid: &str, hdid: &str, at: u64, duration: Option<u64>) -> NewBan {
    NewBan {
        ipid: ipid.to_string(),
        hdid: hdid.to_string(),
        banned_at_secs: at,
        duration_secs: duration,
        reason: "spam".to_string(),
        moderator: "mod".to_string(),
    }
}

fn warning(ipid: &str, reason: &str) -> Warning {
    Warning { ipid: ipid.to_string(), reason: reason.to_string(), moderator: "mod".to_string(), issued_at_secs: 10 }
}

fn redb() -> (TempDir, RedbStorage) {
    let dir = TempDir::new().unwrap();
    let storage = RedbStorage::open(dir.path().join("athena.redb")).unwrap();
    (dir, storage)
}

fn check_ban_lifecycle(storage: &dyn Storage) {
    let first = storage.add_ban(ban("ip-a", "hd-a", 1000, Some(60))).unwrap();
    let second = storage.add_ban(ban("ip-b", "", 1000, None)).unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);
    assert_eq!(first.until_secs, Some(1060));

    // Matched on either identifier while in force
    assert_eq!(storage.find_active_ban("ip-a", "", 1010).unwrap().map(|b| b.id), Some(1));
    assert_eq!(storage.find_active_ban("ip-x", "hd-a", 1010).unwrap().map(|b| b.id), Some(1));
    assert_eq!(storage.find_active_ban("ip-a", "", 1060).unwrap(), None);
    // An empty HDID never matches another empty HDID
    assert_eq!(storage.find_active_ban("ip-x", "", 1010).unwrap(), None);

    assert!(storage.nullify_ban(2).unwrap());
    assert!(!storage.nullify_ban(99).unwrap());
    assert_eq!(storage.find_active_ban("ip-b", "", 5000).unwrap(), None);
    assert!(storage.get_ban(2).unwrap().unwrap().nullified);
}

fn check_ban_listing(storage: &dyn Storage) {
    for i in 0..5 {
        storage.add_ban(ban(if i % 2 == 0 { "even" } else { "odd" }, "", i, None)).unwrap();
    }
    let newest: Vec<u64> = storage.list_bans(None, 3).unwrap().iter().map(|b| b.id).collect();
    assert_eq!(newest, [5, 4, 3]);
    let odd: Vec<u64> = storage.list_bans(Some("odd"), 10).unwrap().iter().map(|b| b.id).collect();
    assert_eq!(odd, [4, 2]);
}

fn check_warnings(storage: &dyn Storage) {
    assert_eq!(storage.add_warning(warning("ip-a", "one")).unwrap(), 1);
    assert_eq!(storage.add_warning(warning("ip-a", "two")).unwrap(), 2);
    assert_eq!(storage.add_warning(warning("ip-b", "other")).unwrap(), 1);

    let reasons: Vec<String> = storage.warnings("ip-a").unwrap().into_iter().map(|w| w.reason).collect();
    assert_eq!(reasons, ["one", "two"]);
    assert!(storage.warnings("ip-c").unwrap().is_empty());
}

fn check_users(storage: &dyn Storage) {
    storage.create_user(UserRecord::new("phoenix", "turnabout", "moderator", [1; 16])).unwrap();
    assert_eq!(
        storage.create_user(UserRecord::new("phoenix", "other", "admin", [2; 16])),
        Err(StorageError::AlreadyExists("phoenix".to_string()))
    );

    assert!(storage.authenticate("phoenix", "turnabout").unwrap().is_some());
    assert!(storage.authenticate("phoenix", "wrong").unwrap().is_none());
    assert!(storage.authenticate("nobody", "turnabout").unwrap().is_none());

    assert!(storage.set_role("phoenix", "admin").unwrap());
    assert_eq!(storage.user("phoenix").unwrap().unwrap().role, "admin");
    assert!(!storage.set_role("nobody", "admin").unwrap());

    assert!(storage.remove_user("phoenix").unwrap());
    assert!(!storage.remove_user("phoenix").unwrap());
    assert!(storage.user("phoenix").unwrap().is_none());
}

#[test]
fn memory_ban_lifecycle() {
    check_ban_lifecycle(&MemoryStorage::new());
}

#[test]
fn memory_ban_listing() {
    check_ban_listing(&MemoryStorage::new());
}

#[test]
fn memory_warnings() {
    check_warnings(&MemoryStorage::new());
}

#[test]
fn memory_users() {
    check_users(&MemoryStorage::new());
}

#[test]
fn redb_ban_lifecycle() {
    let (_dir, storage) = redb();
    check_ban_lifecycle(&storage);
}

#[test]
fn redb_ban_listing() {
    let (_dir, storage) = redb();
    check_ban_listing(&storage);
}

#[test]
fn redb_warnings() {
    let (_dir, storage) = redb();
    check_warnings(&storage);
}

#[test]
fn redb_users() {
    let (_dir, storage) = redb();
    check_users(&storage);
}

#[test]
fn redb_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("athena.redb");
    {
        let storage = RedbStorage::open(&path).unwrap();
        storage.add_ban(ban("ip-a", "hd-a", 100, None)).unwrap();
        storage.add_warning(warning("ip-a", "careful")).unwrap();
        storage.create_user(UserRecord::new("maya", "channel", "moderator", [3; 16])).unwrap();
    }

    let storage = RedbStorage::open(&path).unwrap();
    assert_eq!(storage.find_active_ban("ip-a", "", 200).unwrap().map(|b| b.id), Some(1));
    assert_eq!(storage.warnings("ip-a").unwrap().len(), 1);
    assert!(storage.authenticate("maya", "channel").unwrap().is_some());
    // Ids keep counting after a restart
    assert_eq!(storage.add_ban(ban("ip-b", "", 300, None)).unwrap().id, 2);
}
