//! Result shapes produced by the query executor.

use crate::db::DbError;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One result record; keys follow the selected column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Uniform envelope returned by `EngineHandle::execute`.
///
/// `success == false` always carries a non-empty `error_message` and no rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    pub success: bool,
    pub rows: Vec<Row>,
    pub error_message: Option<String>,
}

impl QueryOutcome {
    pub fn ok(rows: Vec<Row>) -> Self {
        Self {
            success: true,
            rows,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "statement failed".to_string()
        } else {
            message
        };
        Self {
            success: false,
            rows: Vec::new(),
            error_message: Some(message),
        }
    }
}

/// A single statement was rejected by the engine.
///
/// Recoverable: the connection stays usable after this error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementError {
    message: String,
}

impl StatementError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable engine message, e.g. `no such table: x`.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StatementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for StatementError {}

impl From<rusqlite::Error> for StatementError {
    fn from(value: rusqlite::Error) -> Self {
        Self::new(value.to_string())
    }
}

/// Failure of the typed query path.
#[derive(Debug)]
pub enum QueryError {
    Statement(StatementError),
    /// The worker could not be reached; the statement never ran.
    Engine(DbError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Statement(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Statement(err) => Some(err),
            Self::Engine(err) => Some(err),
        }
    }
}

impl From<StatementError> for QueryError {
    fn from(value: StatementError) -> Self {
        Self::Statement(value)
    }
}

impl From<DbError> for QueryError {
    fn from(value: DbError) -> Self {
        Self::Engine(value)
    }
}

pub(crate) fn value_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(v) => JsonValue::from(v),
        ValueRef::Real(v) => serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::{value_to_json, QueryOutcome};
    use rusqlite::types::ValueRef;
    use serde_json::json;

    #[test]
    fn failure_envelope_never_has_blank_message() {
        let outcome = QueryOutcome::failure("  ");
        assert!(!outcome.success);
        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.error_message.as_deref(), Some("statement failed"));
    }

    #[test]
    fn envelope_serializes_with_camel_case_keys() {
        let encoded = serde_json::to_value(QueryOutcome::ok(Vec::new())).unwrap();
        assert_eq!(
            encoded,
            json!({ "success": true, "rows": [], "errorMessage": null })
        );
    }

    #[test]
    fn engine_values_map_to_json() {
        assert_eq!(value_to_json(ValueRef::Null), json!(null));
        assert_eq!(value_to_json(ValueRef::Integer(7)), json!(7));
        assert_eq!(value_to_json(ValueRef::Real(1.5)), json!(1.5));
        assert_eq!(value_to_json(ValueRef::Real(f64::NAN)), json!(null));
        assert_eq!(value_to_json(ValueRef::Text(b"Ann")), json!("Ann"));
        assert_eq!(value_to_json(ValueRef::Blob(&[1, 2])), json!([1, 2]));
    }
}
