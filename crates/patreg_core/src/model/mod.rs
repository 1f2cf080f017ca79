//! Domain model for the patient registry.
//!
//! # Responsibility
//! - Define canonical data structures shared by repository and service.
//!
//! # Invariants
//! - Every persisted patient is identified by an engine-assigned `PatientId`.
//! - Column identifiers come from `PatientField`, never from caller strings.

pub mod patient;
