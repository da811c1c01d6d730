use rusqlite::Connection;
use spellpath_core::db::migrations::latest_version;
use spellpath_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn in_memory_database_has_practice_schema() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "words",
        "word_lists",
        "word_list_items",
        "learners",
        "sessions",
        "session_minisets",
        "attempts",
        "session_locks",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spellpath.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "session_locks");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn attempts_reject_update_and_delete() {
    let conn = open_db_in_memory().unwrap();
    let update = conn.execute("UPDATE attempts SET correct = 1;", []);
    // No rows yet: the trigger only fires per row, so seed one first.
    assert!(update.is_ok());

    conn.execute_batch(
        "INSERT INTO words (id, spelling, level) VALUES ('w1', 'cat', 1);
         INSERT INTO learners (id, owner_ref, display_name) VALUES ('l1', 'o', 'n');
         INSERT INTO sessions (id, learner_id, mode, state, current_level, level_start, started_at)
             VALUES ('s1', 'l1', 'practice', 'spelling', 1, 1, 0);
         INSERT INTO attempts (id, session_id, learner_id, miniset_ordinal, word_id, word,
             user_spelling, correct, rating_before, rating_after, response_ms, input_mode, created_at)
             VALUES ('a1', 's1', 'l1', 0, 'w1', 'cat', 'kat', 0, 1500.0, 1490.0, 800, 'typed', 0);",
    )
    .unwrap();

    let update = conn.execute("UPDATE attempts SET correct = 1;", []);
    assert!(update.is_err());
    assert!(conn.execute("DELETE FROM attempts;", []).is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
