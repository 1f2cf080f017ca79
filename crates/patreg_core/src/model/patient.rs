//! Patient domain model.
//!
//! # Responsibility
//! - Define the persisted patient record and its insertable draft.
//! - Define the closed set of updatable columns and the update field set.
//!
//! # Invariants
//! - `id` and `created_at` are engine-assigned and never updatable.
//! - Update statements only ever name columns from `PatientField`.
//! - Bind values never become part of SQL text.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Engine-assigned, monotonic patient identifier.
pub type PatientId = i64;

/// Table holding every patient row.
pub const PATIENT_TABLE: &str = "patients";

/// Column list shared by reads and `RETURNING` clauses.
pub const PATIENT_COLUMNS: &str =
    "id, firstName, lastName, dob, gender, email, phone, address, medicalHistory, createdAt";

/// Persisted patient row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: PatientId,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth as stored text, usually `YYYY-MM-DD`.
    pub dob: String,
    pub gender: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    /// Insertion timestamp assigned by the engine.
    pub created_at: String,
}

/// Insertable patient fields.
///
/// The repository does not validate drafts; callers that need the required
/// fields checked use `missing_required_fields`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientDraft {
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub gender: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
}

impl PatientDraft {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        dob: impl Into<String>,
        gender: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            dob: dob.into(),
            gender: gender.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_medical_history(mut self, history: impl Into<String>) -> Self {
        self.medical_history = Some(history.into());
        self
    }

    /// Required fields that are blank after trimming, in column order.
    pub fn missing_required_fields(&self) -> Vec<PatientField> {
        PatientField::ALL
            .into_iter()
            .filter(|field| field.is_required())
            .filter(|field| {
                self.value_of(*field)
                    .map_or(true, |value| value.trim().is_empty())
            })
            .collect()
    }

    /// Positional bind values for the eight insertable columns.
    ///
    /// Absent or empty optional fields bind as NULL.
    pub(crate) fn bind_values(&self) -> Vec<Value> {
        PatientField::ALL
            .into_iter()
            .map(|field| match self.value_of(field) {
                Some(value) if field.is_required() || !value.is_empty() => {
                    Value::Text(value.to_string())
                }
                _ => Value::Null,
            })
            .collect()
    }

    fn value_of(&self, field: PatientField) -> Option<&str> {
        match field {
            PatientField::FirstName => Some(self.first_name.as_str()),
            PatientField::LastName => Some(self.last_name.as_str()),
            PatientField::Dob => Some(self.dob.as_str()),
            PatientField::Gender => Some(self.gender.as_str()),
            PatientField::Email => self.email.as_deref(),
            PatientField::Phone => self.phone.as_deref(),
            PatientField::Address => self.address.as_deref(),
            PatientField::MedicalHistory => self.medical_history.as_deref(),
        }
    }
}

/// Closed set of updatable patient columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatientField {
    FirstName,
    LastName,
    Dob,
    Gender,
    Email,
    Phone,
    Address,
    MedicalHistory,
}

impl PatientField {
    /// Every updatable column in table order.
    pub const ALL: [PatientField; 8] = [
        Self::FirstName,
        Self::LastName,
        Self::Dob,
        Self::Gender,
        Self::Email,
        Self::Phone,
        Self::Address,
        Self::MedicalHistory,
    ];

    /// SQL column name. The only source of column identifiers in updates.
    pub fn column(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Dob => "dob",
            Self::Gender => "gender",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::MedicalHistory => "medicalHistory",
        }
    }

    /// Whether the column is declared `NOT NULL`.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Self::FirstName | Self::LastName | Self::Dob | Self::Gender
        )
    }
}

impl Display for PatientField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Error for a field name outside `PatientField`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPatientField(pub String);

impl Display for UnknownPatientField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown patient field `{}`", self.0)
    }
}

impl std::error::Error for UnknownPatientField {}

impl FromStr for PatientField {
    type Err = UnknownPatientField;

    /// Accepts the column name, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.column().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownPatientField(trimmed.to_string()))
    }
}

/// Ordered partial update of a patient row.
///
/// Setting a field twice keeps its first position and the latest value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientUpdate {
    changes: Vec<(PatientField, Option<String>)>,
}

impl PatientUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value`.
    pub fn set(mut self, field: PatientField, value: impl Into<String>) -> Self {
        self.put(field, Some(value.into()));
        self
    }

    /// Sets `field` to NULL. Required fields will be rejected by the engine.
    pub fn clear(mut self, field: PatientField) -> Self {
        self.put(field, None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Fields in the order they will appear in the `SET` clause.
    pub fn fields(&self) -> impl Iterator<Item = PatientField> + '_ {
        self.changes.iter().map(|(field, _)| *field)
    }

    /// Builds the `UPDATE` statement and its bind values.
    ///
    /// Placeholders follow field order; `id` is always the last bind value.
    pub fn to_statement(&self, id: PatientId) -> (String, Vec<Value>) {
        let set_clause = self
            .changes
            .iter()
            .enumerate()
            .map(|(idx, (field, _))| format!("{} = ?{}", field.column(), idx + 1))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE {PATIENT_TABLE} SET {set_clause} WHERE id = ?{} RETURNING {PATIENT_COLUMNS};",
            self.changes.len() + 1
        );

        let mut params = self
            .changes
            .iter()
            .map(|(_, value)| value.clone().map_or(Value::Null, Value::Text))
            .collect::<Vec<_>>();
        params.push(Value::Integer(id));

        (sql, params)
    }

    fn put(&mut self, field: PatientField, value: Option<String>) {
        match self.changes.iter_mut().find(|(existing, _)| *existing == field) {
            Some(slot) => slot.1 = value,
            None => self.changes.push((field, value)),
        }
    }
}
