//! File store persistence tests

use chrono::Utc;
use potsplit_sessions::{
    Config, FileStore, NewPlayer, Session, SessionId, SessionService, SessionStatus, SessionStore,
    SystemClock,
};
use potsplit_settlement::PaymentHandle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs;
use std::sync::Arc;

fn new_player(name: &str, buy_in: Decimal, final_amount: Decimal) -> NewPlayer {
    NewPlayer {
        name: name.to_string(),
        buy_in_amount: buy_in,
        final_amount: Some(final_amount),
        payment_handle: Some(PaymentHandle::parse(format!("@{name}")).unwrap()),
    }
}

fn config_for(dir: &std::path::Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

#[test]
fn test_sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());

    let id = {
        let service = SessionService::open(&config).unwrap();
        let id = service.create_session().unwrap().id;
        service.add_player(&id, new_player("host", dec!(100), dec!(150))).unwrap();
        service.add_player(&id, new_player("bob", dec!(100), dec!(50))).unwrap();
        service.settle(&id, Decimal::ZERO).unwrap();
        id
    };

    let service = SessionService::open(&config).unwrap();
    let session = service.get_session(&id).unwrap();
    assert_eq!(session.players.len(), 2);
    assert_eq!(session.status, SessionStatus::PendingSettlement);
    assert_eq!(session.transactions.len(), 2);
    assert_eq!(session.transactions[0].amount(), dec!(50.00));
}

#[test]
fn test_corrupt_file_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.quarantined().len(), 1);
    assert!(store.list().unwrap().is_empty());
    assert!(!dir.path().join("broken.json").exists());

    let backups: Vec<_> = fs::read_dir(dir.path().join("backup")).unwrap().collect();
    assert_eq!(backups.len(), 1);
}

#[test]
fn test_invalid_record_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let json = serde_json::json!({
        "id": "dup",
        "createdAt": Utc::now(),
        "status": "active",
        "players": [
            { "name": "a", "buyInAmount": "10", "status": "pending" },
            { "name": "a", "buyInAmount": "20", "status": "pending" }
        ]
    });
    fs::write(dir.path().join("dup.json"), json.to_string()).unwrap();

    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.quarantined().len(), 1);
    assert!(store.get(&SessionId::parse("dup").unwrap()).unwrap().is_none());
}

#[test]
fn test_mismatched_file_name_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new(SessionId::parse("real").unwrap(), Utc::now());
    fs::write(
        dir.path().join("other.json"),
        serde_json::to_string(&session).unwrap(),
    )
    .unwrap();

    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.quarantined().len(), 1);
}

#[test]
fn test_delete_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let service = SessionService::new(store.clone(), Arc::new(SystemClock), &config_for(dir.path()));

    let id = service.create_session().unwrap().id;
    let path = store.session_path(&id);
    assert!(path.exists());

    assert!(store.delete(&id).unwrap());
    assert!(!path.exists());
    assert!(!store.delete(&id).unwrap());
}

#[test]
fn test_failed_quarantine_does_not_block_open() {
    let dir = tempfile::tempdir().unwrap();
    // A plain file where the backup directory should go makes the move fail
    fs::write(dir.path().join("backup"), "").unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let good = Session::new(SessionId::parse("good").unwrap(), Utc::now());
    fs::write(
        dir.path().join("good.json"),
        serde_json::to_string(&good).unwrap(),
    )
    .unwrap();

    let store = FileStore::open(dir.path()).unwrap();
    assert!(store.quarantined().is_empty());
    assert!(dir.path().join("broken.json").exists());
    assert_eq!(store.list().unwrap().len(), 1);
    assert!(store.get(&good.id).unwrap().is_some());
}
