use kingraph_core::db::migrations::latest_version;
use kingraph_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn in_memory_store_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert!(table_exists(&conn, "persons"));
    assert!(index_exists(&conn, "idx_persons_collection"));
}

#[test]
fn reopening_a_store_file_keeps_its_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kingraph.db");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO persons (id, document) VALUES ('p1', '{\"id\":\"p1\"}');",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    let rows: i64 = second
        .query_row("SELECT COUNT(*) FROM persons;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn store_from_a_newer_binary_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, name: &str) -> bool {
    sqlite_master_has(conn, "table", name)
}

fn index_exists(conn: &Connection, name: &str) -> bool {
    sqlite_master_has(conn, "index", name)
}

fn sqlite_master_has(conn: &Connection, kind: &str, name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2);",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}
