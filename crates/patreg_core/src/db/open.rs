//! Connection opening for the engine worker.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Apply connection pragmas required by the persistence layer.
//!
//! # Invariants
//! - `open_connection` never touches the schema; the connection manager runs
//!   the bootstrap handshake separately.
//! - `open_db*` helpers return connections with the schema in place.

use super::schema::ensure_schema;
use super::DbResult;
use crate::config::{DbConfig, DbLocation};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the connection described by `config` and applies pragmas.
///
/// # Side effects
/// - Creates the database file when it does not exist.
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(config: &DbConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = config.location.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let opened = match &config.location {
        DbLocation::Memory => Connection::open_in_memory(),
        DbLocation::File(path) => Connection::open(path),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    if let Err(err) = configure_connection(&conn, config.busy_timeout) {
        error!(
            "event=db_open module=db status=error mode={} duration_ms={} error_code=db_pragma_failed error={}",
            mode,
            started_at.elapsed().as_millis(),
            err
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode={} duration_ms={}",
        mode,
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

/// Opens a database file synchronously with the schema in place.
///
/// Intended for tooling and tests that inspect a database file directly
/// rather than through the engine worker.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let mut conn = open_connection(&DbConfig::file(path.as_ref()))?;
    ensure_schema(&mut conn)?;
    Ok(conn)
}

/// Opens a private in-memory database with the schema in place.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let mut conn = open_connection(&DbConfig::in_memory())?;
    ensure_schema(&mut conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let timeout = if busy_timeout.is_zero() {
        DEFAULT_BUSY_TIMEOUT
    } else {
        busy_timeout
    };
    conn.busy_timeout(timeout)?;
    Ok(())
}
