use patreg_core::db::schema::{ensure_schema, schema_version, SCHEMA_VERSION};
use patreg_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_creates_patient_schema() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    assert_eq!(count_objects(&conn, "table", "patients"), 1);
    assert_eq!(count_objects(&conn, "index", "idx_patient_name"), 1);
}

#[test]
fn ensure_schema_twice_is_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO patients (firstName, lastName, dob, gender) VALUES ('Ann', 'Lee', '1990-01-01', 'female');",
        [],
    )
    .unwrap();

    ensure_schema(&mut conn).unwrap();
    ensure_schema(&mut conn).unwrap();

    assert_eq!(count_objects(&conn, "table", "patients"), 1);
    assert_eq!(count_objects(&conn, "index", "idx_patient_name"), 1);
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM patients;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn name_index_covers_last_then_first_name() {
    let conn = open_db_in_memory().unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_index_info('idx_patient_name') ORDER BY seqno;")
        .unwrap();
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(columns, vec!["lastName", "firstName"]);
}

#[test]
fn reopening_same_file_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO patients (firstName, lastName, dob, gender) VALUES ('Bob', 'Annson', '1980-05-05', 'male');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), SCHEMA_VERSION);
    let rows: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM patients;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn required_columns_reject_null_and_blank_values() {
    let conn = open_db_in_memory().unwrap();

    let missing = conn.execute(
        "INSERT INTO patients (firstName, lastName, dob) VALUES ('Ann', 'Lee', '1990-01-01');",
        [],
    );
    assert!(missing.is_err());

    let blank = conn.execute(
        "INSERT INTO patients (firstName, lastName, dob, gender) VALUES ('  ', 'Lee', '1990-01-01', 'female');",
        [],
    );
    assert!(blank.is_err());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
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
            assert_eq!(latest_supported, SCHEMA_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn count_objects(conn: &Connection, kind: &str, name: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2;",
        [kind, name],
        |row| row.get(0),
    )
    .unwrap()
}
