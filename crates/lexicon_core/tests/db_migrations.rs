use lexicon_core::db::migrations::{latest_version, schema_version};
use lexicon_core::db::{open_db, open_db_in_memory, open_db_with_config, DbError};
use lexicon_core::{EngineConfig, RepoError, SqliteDefinitionRepository, SqliteVoteLedger};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "definitions");
    assert_table_exists(&conn, "votes");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lexicon.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let config = EngineConfig {
        busy_timeout_ms: 250,
        ..EngineConfig::default()
    };
    let conn_second = open_db_with_config(&path, &config).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "votes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn stores_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    assert!(matches!(
        SqliteVoteLedger::try_new(&conn),
        Err(RepoError::MissingRequiredTable("votes"))
    ));
    assert!(matches!(
        SqliteDefinitionRepository::try_new(&conn),
        Err(RepoError::MissingRequiredTable("definitions"))
    ));
}

#[test]
fn vote_table_rejects_zero_and_duplicate_records() {
    let conn = open_db_in_memory().unwrap();

    let zero = conn.execute(
        "INSERT INTO votes (actor_id, definition_uuid, value) VALUES ('u1', 'd1', 0);",
        [],
    );
    assert!(zero.is_err());

    conn.execute(
        "INSERT INTO votes (actor_id, definition_uuid, value) VALUES ('u1', 'd1', 1);",
        [],
    )
    .unwrap();
    let duplicate = conn.execute(
        "INSERT INTO votes (actor_id, definition_uuid, value) VALUES ('u1', 'd1', -1);",
        [],
    );
    assert!(duplicate.is_err());
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
