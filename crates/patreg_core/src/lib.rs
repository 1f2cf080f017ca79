//! Embedded persistence layer for the patient registry.
//! This crate owns the engine connection, the patient schema, and every
//! query path the front ends use.

pub mod config;
pub mod connection;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod readiness;
pub mod repo;
pub mod service;

pub use config::{DbConfig, DbLocation};
pub use connection::{ConnectionError, ConnectionManager, ConnectionStats};
pub use engine::{EngineHandle, QueryError, QueryOutcome, Row, SqlValue, StatementError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::patient::{
    Patient, PatientDraft, PatientField, PatientId, PatientUpdate, UnknownPatientField,
};
pub use readiness::{startup, DbStatus, ReadinessSignal, DATABASE_UNAVAILABLE_MESSAGE};
pub use repo::patient_repo::{PatientRepository, RepoError, RepoResult, SqlitePatientRepository};
pub use service::patient_service::{
    sort_patients, ImportReport, PatientService, SortKey, SortOrder,
};

/// Minimal health-check API for front-end wiring.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
