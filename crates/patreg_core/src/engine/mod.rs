//! Embedded engine running on an isolated worker thread.
//!
//! # Responsibility
//! - Start the SQLite engine off the caller's thread and report readiness.
//! - Carry statements to the worker over an async request/response channel.
//! - Normalize statement results into `QueryOutcome` envelopes.
//!
//! # Invariants
//! - Bind values travel separately from SQL text; nothing is interpolated.
//! - All `EngineHandle` clones feed one queue, so statements never interleave.
//! - The worker stops once every handle is dropped.

mod outcome;
mod worker;

pub use outcome::{QueryError, QueryOutcome, Row, StatementError};
pub use rusqlite::types::Value as SqlValue;

use crate::config::DbConfig;
use crate::db::{DbError, DbResult};
use log::{debug, error, info, warn};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use worker::Request;

const WORKER_THREAD_NAME: &str = "patreg-engine";

/// Starts engine workers.
pub struct Engine;

impl Engine {
    /// Spawns the worker thread and waits until it has opened its connection.
    ///
    /// # Errors
    /// - `DbError::Sqlite` when the connection cannot be opened or configured.
    /// - `DbError::WorkerUnavailable` when the thread cannot be spawned or
    ///   exits before reporting readiness.
    pub async fn start(config: &DbConfig) -> DbResult<EngineHandle> {
        let started_at = Instant::now();
        info!(
            "event=engine_start module=engine status=start mode={}",
            config.location.mode()
        );

        let (request_tx, request_rx) = mpsc::channel::<Request>(config.queue_capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel::<DbResult<()>>();
        let worker_config = config.clone();

        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker::run(worker_config, request_rx, ready_tx))
            .map_err(|err| {
                DbError::WorkerUnavailable(format!("failed to spawn engine thread: {err}"))
            })?;

        let result = match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(DbError::WorkerUnavailable(
                "engine thread exited before reporting readiness".to_string(),
            )),
        };

        match result {
            Ok(()) => {
                debug!(
                    "event=engine_start module=engine status=handshake duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(EngineHandle {
                    requests: request_tx,
                })
            }
            Err(err) => {
                error!(
                    "event=engine_start module=engine status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

/// Shared handle to a running engine worker.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    requests: mpsc::Sender<Request>,
}

impl EngineHandle {
    /// Runs the schema bootstrapper inside the worker.
    pub async fn bootstrap(&self) -> DbResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Request::Bootstrap { reply }).await?;
        response.await.map_err(|_| worker_gone())?
    }

    /// Runs one statement with positional bind values.
    ///
    /// # Errors
    /// - `QueryError::Statement` when the engine rejects the statement.
    /// - `QueryError::Engine` when the worker is no longer running.
    pub async fn query(
        &self,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> Result<Vec<Row>, QueryError> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(StatementError::new("empty statement").into());
        }

        let (reply, response) = oneshot::channel();
        self.send(Request::Query { sql, params, reply }).await?;
        let rows = response.await.map_err(|_| worker_gone())??;
        Ok(rows)
    }

    /// Runs one statement and folds every failure into the envelope.
    ///
    /// Never returns an error; free-text callers inspect `success` instead.
    pub async fn execute(&self, sql: impl Into<String>, params: Vec<SqlValue>) -> QueryOutcome {
        let sql = sql.into();
        let started_at = Instant::now();
        let sql_len = sql.len();
        let param_count = params.len();

        match self.query(sql, params).await {
            Ok(rows) => {
                debug!(
                    "event=query_exec module=engine status=ok sql_len={} params={} rows={} duration_ms={}",
                    sql_len,
                    param_count,
                    rows.len(),
                    started_at.elapsed().as_millis()
                );
                QueryOutcome::ok(rows)
            }
            Err(err) => {
                warn!(
                    "event=query_exec module=engine status=error sql_len={} params={} duration_ms={} error={}",
                    sql_len,
                    param_count,
                    started_at.elapsed().as_millis(),
                    err
                );
                QueryOutcome::failure(err.to_string())
            }
        }
    }

    /// Returns whether the worker is still accepting requests.
    pub fn is_alive(&self) -> bool {
        !self.requests.is_closed()
    }

    async fn send(&self, request: Request) -> DbResult<()> {
        self.requests.send(request).await.map_err(|_| worker_gone())
    }
}

fn worker_gone() -> DbError {
    DbError::WorkerUnavailable("engine worker stopped".to_string())
}
