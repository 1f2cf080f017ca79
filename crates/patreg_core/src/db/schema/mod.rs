//! Patient schema bootstrapper.
//!
//! # Responsibility
//! - Create the `patients` table and its name index on first connection.
//! - Record the schema version for later compatibility checks.
//!
//! # Invariants
//! - Every statement uses "if not exists" semantics; repeated runs are no-ops.
//! - A database stamped by a newer build is rejected, never downgraded.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Version written to `PRAGMA user_version` once the schema exists.
pub const SCHEMA_VERSION: u32 = 1;

const PATIENT_SCHEMA_SQL: &str = include_str!("0001_patients.sql");

/// Creates the patient table and name index when absent.
///
/// Safe to call any number of times against the same connection.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let started_at = Instant::now();
    let current = schema_version(conn)?;

    if current > SCHEMA_VERSION {
        error!(
            "event=schema_bootstrap module=db status=error db_version={} latest_supported={}",
            current, SCHEMA_VERSION
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.transaction()?;
    tx.execute_batch(PATIENT_SCHEMA_SQL)?;
    if current < SCHEMA_VERSION {
        tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    }
    tx.commit()?;

    info!(
        "event=schema_bootstrap module=db status=ok from_version={} to_version={} duration_ms={}",
        current,
        SCHEMA_VERSION,
        started_at.elapsed().as_millis()
    );
    Ok(())
}

/// Reads the schema version recorded in the database header.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
