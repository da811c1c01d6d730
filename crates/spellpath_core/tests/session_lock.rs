use spellpath_core::db::{open_db, open_db_in_memory};
use spellpath_core::model::now_epoch_ms;
use spellpath_core::repo::lock_repo::{SessionLockRepository, SqliteSessionLockRepository};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const TTL: Duration = Duration::from_secs(30);

#[test]
fn second_acquire_is_refused_until_release() {
    let conn = open_db_in_memory().unwrap();
    let locks = SqliteSessionLockRepository::new(&conn);
    let session_id = Uuid::new_v4();

    let first = locks.acquire(session_id, TTL).unwrap();
    assert!(first.acquired);
    let token = first.token.unwrap();

    let second = locks.acquire(session_id, TTL).unwrap();
    assert!(!second.acquired);
    assert!(second.token.is_none());
    assert_eq!(second.expires_at, first.expires_at);

    assert!(!locks.release(session_id, Uuid::new_v4()).unwrap());
    assert_eq!(locks.holder(session_id).unwrap(), Some(token));
    assert!(locks.release(session_id, token).unwrap());
    assert!(locks.acquire(session_id, TTL).unwrap().acquired);
}

#[test]
fn expired_lock_is_reclaimed() {
    let conn = open_db_in_memory().unwrap();
    let locks = SqliteSessionLockRepository::new(&conn);
    let session_id = Uuid::new_v4();
    let now = now_epoch_ms();

    let stale = locks
        .acquire_at(session_id, Duration::from_millis(10), now - 60_000)
        .unwrap();
    assert!(stale.acquired);

    let fresh = locks.acquire_at(session_id, TTL, now).unwrap();
    assert!(fresh.acquired);
    assert_ne!(fresh.token, stale.token);

    // The stale holder can no longer release the reclaimed lock.
    assert!(!locks.release(session_id, stale.token.unwrap()).unwrap());
    assert_eq!(locks.holder(session_id).unwrap(), fresh.token);
}

#[test]
fn purge_removes_only_expired_rows() {
    let conn = open_db_in_memory().unwrap();
    let locks = SqliteSessionLockRepository::new(&conn);
    let now = now_epoch_ms();
    let (expired, live) = (Uuid::new_v4(), Uuid::new_v4());

    locks
        .acquire_at(expired, Duration::from_millis(1), now - 10_000)
        .unwrap();
    locks.acquire_at(live, TTL, now).unwrap();

    assert_eq!(locks.purge_expired(now).unwrap(), 1);
    assert!(locks.holder(expired).unwrap().is_none());
    assert!(locks.holder(live).unwrap().is_some());
}

#[test]
fn concurrent_acquirers_get_exactly_one_grant() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locks.db");
    drop(open_db(&path).unwrap());

    let session_id = Uuid::new_v4();
    let contenders = 8;
    let barrier = Arc::new(Barrier::new(contenders));

    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let locks = SqliteSessionLockRepository::new(&conn);
                barrier.wait();
                locks.acquire(session_id, TTL).unwrap().acquired
            })
        })
        .collect();

    let granted = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|acquired| *acquired)
        .count();
    assert_eq!(granted, 1);
}
