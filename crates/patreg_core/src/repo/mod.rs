//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQL details from service orchestration.
//!
//! # Invariants
//! - Repositories perform no field validation; the engine's constraints are
//!   the last line of defense and surface as `RepoError::Statement`.
//! - Repository APIs return semantic errors (`InvalidArgument`, `NotFound`)
//!   in addition to connection and statement failures.

pub mod patient_repo;
