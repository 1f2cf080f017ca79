//! Engine worker thread body.
//!
//! # Invariants
//! - The worker owns the only `Connection`; nothing else touches it.
//! - Requests are handled strictly one at a time in arrival order.

use super::outcome::{value_to_json, Row, StatementError};
use crate::config::DbConfig;
use crate::db::schema::ensure_schema;
use crate::db::{open_connection, DbResult};
use log::{debug, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Batch, Connection};
use tokio::sync::{mpsc, oneshot};

pub(super) enum Request {
    Bootstrap {
        reply: oneshot::Sender<DbResult<()>>,
    },
    Query {
        sql: String,
        params: Vec<Value>,
        reply: oneshot::Sender<Result<Vec<Row>, StatementError>>,
    },
}

pub(super) fn run(
    config: DbConfig,
    mut requests: mpsc::Receiver<Request>,
    ready: oneshot::Sender<DbResult<()>>,
) {
    let mut conn = match open_connection(&config) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        warn!("event=engine_start module=engine status=error error_code=starter_dropped");
        return;
    }
    info!(
        "event=engine_start module=engine status=ok mode={}",
        config.location.mode()
    );

    let mut handled: u64 = 0;
    while let Some(request) = requests.blocking_recv() {
        handled += 1;
        match request {
            Request::Bootstrap { reply } => {
                let _ = reply.send(ensure_schema(&mut conn));
            }
            Request::Query { sql, params, reply } => {
                let result = run_query(&conn, &sql, &params);
                if reply.send(result).is_err() {
                    debug!("event=query_exec module=engine status=abandoned");
                }
            }
        }
    }

    info!("event=engine_stop module=engine status=ok handled={handled}");
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, StatementError> {
    let mut batch = Batch::new(conn, sql);
    let mut stmt = batch
        .next()?
        .ok_or_else(|| StatementError::new("empty statement"))?;
    if batch.next()?.is_some() {
        return Err(StatementError::new(
            "multiple statements are not allowed; run them one at a time",
        ));
    }

    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect::<Vec<_>>();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            record.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        records.push(record);
    }
    Ok(records)
}
