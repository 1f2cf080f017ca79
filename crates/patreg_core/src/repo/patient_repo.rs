//! Patient repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide typed CRUD APIs over the `patients` table.
//! - Route every statement through the shared engine handle.
//!
//! # Invariants
//! - All caller values are bound positionally; SQL text is fixed or built
//!   from `PatientField` column names only.
//! - `update` with no fields fails before any engine round-trip.
//! - `delete` only removes a row after confirming exactly one match.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::connection::{ConnectionError, ConnectionManager};
use crate::engine::{EngineHandle, QueryError, Row, SqlValue, StatementError};
use crate::model::patient::{
    Patient, PatientDraft, PatientId, PatientUpdate, PATIENT_COLUMNS, PATIENT_TABLE,
};
use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for patient persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Precondition violated by the caller; the engine was not contacted.
    InvalidArgument(String),
    Connection(ConnectionError),
    Statement(StatementError),
    NotFound(PatientId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Connection(err) => write!(f, "{err}"),
            Self::Statement(err) => write!(f, "statement failed: {err}"),
            Self::NotFound(id) => write!(f, "patient not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted patient data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(err) => Some(err),
            Self::Statement(err) => Some(err),
            Self::InvalidArgument(_) | Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ConnectionError> for RepoError {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<StatementError> for RepoError {
    fn from(value: StatementError) -> Self {
        Self::Statement(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::Statement(err) => Self::Statement(err),
            QueryError::Engine(err) => Self::Connection(err.into()),
        }
    }
}

/// Repository interface for patient CRUD operations.
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn list_all(&self) -> RepoResult<Vec<Patient>>;
    async fn search_by_name(&self, term: &str) -> RepoResult<Vec<Patient>>;
    async fn create(&self, draft: &PatientDraft) -> RepoResult<PatientId>;
    async fn update(&self, id: PatientId, changes: &PatientUpdate) -> RepoResult<Patient>;
    /// Returns `Ok(None)` when no single row matches `id`.
    async fn delete(&self, id: PatientId) -> RepoResult<Option<PatientId>>;
}

/// SQLite-backed patient repository.
#[derive(Clone)]
pub struct SqlitePatientRepository {
    manager: ConnectionManager,
}

impl SqlitePatientRepository {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    async fn engine(&self) -> RepoResult<EngineHandle> {
        Ok(self.manager.connection().await?)
    }
}

#[async_trait]
impl PatientRepository for SqlitePatientRepository {
    async fn list_all(&self) -> RepoResult<Vec<Patient>> {
        let engine = self.engine().await?;
        let rows = engine
            .query(
                format!("SELECT {PATIENT_COLUMNS} FROM {PATIENT_TABLE} ORDER BY id ASC;"),
                Vec::new(),
            )
            .await?;
        parse_patient_rows(&rows)
    }

    async fn search_by_name(&self, term: &str) -> RepoResult<Vec<Patient>> {
        let engine = self.engine().await?;
        let pattern = format!("%{}%", escape_like(term));
        let rows = engine
            .query(
                format!(
                    "SELECT {PATIENT_COLUMNS} FROM {PATIENT_TABLE}
                     WHERE firstName LIKE ?1 ESCAPE '\\'
                        OR lastName LIKE ?1 ESCAPE '\\'
                     ORDER BY id ASC;"
                ),
                vec![SqlValue::Text(pattern)],
            )
            .await?;
        parse_patient_rows(&rows)
    }

    async fn create(&self, draft: &PatientDraft) -> RepoResult<PatientId> {
        let engine = self.engine().await?;
        let rows = engine
            .query(
                format!(
                    "INSERT INTO {PATIENT_TABLE} (
                        firstName,
                        lastName,
                        dob,
                        gender,
                        email,
                        phone,
                        address,
                        medicalHistory
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    RETURNING id;"
                ),
                draft.bind_values(),
            )
            .await
            .map_err(|err| {
                warn!("event=patient_create module=repo status=error error={err}");
                err
            })?;

        let id = rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| RepoError::InvalidData("insert returned no id".to_string()))?;
        info!("event=patient_create module=repo status=ok id={id}");
        Ok(id)
    }

    async fn update(&self, id: PatientId, changes: &PatientUpdate) -> RepoResult<Patient> {
        if changes.is_empty() {
            return Err(RepoError::InvalidArgument(
                "no fields to update".to_string(),
            ));
        }

        let engine = self.engine().await?;
        let (sql, params) = changes.to_statement(id);
        let rows = engine.query(sql, params).await?;
        let row = rows.first().ok_or(RepoError::NotFound(id))?;
        let patient = parse_patient_row(row)?;
        info!(
            "event=patient_update module=repo status=ok id={} fields={}",
            id,
            changes.len()
        );
        Ok(patient)
    }

    async fn delete(&self, id: PatientId) -> RepoResult<Option<PatientId>> {
        let engine = self.engine().await?;
        let rows = engine
            .query(
                format!("SELECT COUNT(*) AS count FROM {PATIENT_TABLE} WHERE id = ?1;"),
                vec![SqlValue::Integer(id)],
            )
            .await?;
        let count = rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| RepoError::InvalidData("count query returned no rows".to_string()))?;

        if count != 1 {
            info!("event=patient_delete module=repo status=skipped id={id} matches={count}");
            return Ok(None);
        }

        engine
            .query(
                format!("DELETE FROM {PATIENT_TABLE} WHERE id = ?1;"),
                vec![SqlValue::Integer(id)],
            )
            .await?;
        info!("event=patient_delete module=repo status=ok id={id}");
        Ok(Some(id))
    }
}

/// Parses engine rows produced by a `PATIENT_COLUMNS` projection.
pub fn parse_patient_rows(rows: &[Row]) -> RepoResult<Vec<Patient>> {
    rows.iter().map(parse_patient_row).collect()
}

fn parse_patient_row(row: &Row) -> RepoResult<Patient> {
    let id = row
        .get("id")
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| RepoError::InvalidData("missing or non-integer patients.id".to_string()))?;

    Ok(Patient {
        id,
        first_name: required_text(row, "firstName", id)?,
        last_name: required_text(row, "lastName", id)?,
        dob: required_text(row, "dob", id)?,
        gender: required_text(row, "gender", id)?,
        email: optional_text(row, "email", id)?,
        phone: optional_text(row, "phone", id)?,
        address: optional_text(row, "address", id)?,
        medical_history: optional_text(row, "medicalHistory", id)?,
        created_at: required_text(row, "createdAt", id)?,
    })
}

fn required_text(row: &Row, column: &str, id: PatientId) -> RepoResult<String> {
    optional_text(row, column, id)?.ok_or_else(|| {
        RepoError::InvalidData(format!("null value in patients.{column} for id {id}"))
    })
}

fn optional_text(row: &Row, column: &str, id: PatientId) -> RepoResult<Option<String>> {
    match row.get(column) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(value)) => Ok(Some(value.clone())),
        // Blobs written through free-text SQL are shown as hex, not rejected.
        Some(JsonValue::Array(items)) => blob_bytes(items)
            .map(|bytes| Some(hex::encode(bytes)))
            .ok_or_else(|| unexpected_value(column, id)),
        Some(_) => Err(unexpected_value(column, id)),
    }
}

fn blob_bytes(items: &[JsonValue]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
        .collect()
}

fn unexpected_value(column: &str, id: PatientId) -> RepoError {
    RepoError::InvalidData(format!("unexpected value in patients.{column} for id {id}"))
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{escape_like, parse_patient_row, RepoError};
    use serde_json::json;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
        assert_eq!(escape_like("ann"), "ann");
    }

    #[test]
    fn parse_rejects_null_required_column() {
        let row = json!({
            "id": 1,
            "firstName": null,
            "lastName": "Lee",
            "dob": "1990-01-01",
            "gender": "female",
            "createdAt": "2024-01-01 00:00:00"
        });
        let row = row.as_object().unwrap();
        let err = parse_patient_row(row).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(message) if message.contains("firstName")));
    }

    #[test]
    fn parse_renders_blob_optional_text_as_hex() {
        let row = json!({
            "id": 3,
            "firstName": "Ann",
            "lastName": "Lee",
            "dob": "1990-01-01",
            "gender": "female",
            "address": [0, 255],
            "createdAt": "2024-01-01 00:00:00"
        });
        let patient = parse_patient_row(row.as_object().unwrap()).unwrap();
        assert_eq!(patient.address.as_deref(), Some("00ff"));
        assert_eq!(patient.email, None);
    }

    #[test]
    fn parse_rejects_non_text_scalars() {
        let row = json!({
            "id": 4,
            "firstName": "Ann",
            "lastName": "Lee",
            "dob": "1990-01-01",
            "gender": "female",
            "phone": true,
            "createdAt": "2024-01-01 00:00:00"
        });
        let err = parse_patient_row(row.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(message) if message.contains("phone")));
    }
}
