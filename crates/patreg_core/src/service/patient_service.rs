//! Patient use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for registry front ends.
//! - Own table-view conveniences: search-or-list, bulk import, sorting.
//!
//! # Invariants
//! - Service APIs never bypass repository persistence contracts.
//! - Service layer remains storage-agnostic.

use crate::model::patient::{Patient, PatientDraft, PatientId, PatientUpdate};
use crate::repo::patient_repo::{PatientRepository, RepoResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Counts produced by a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub registered: usize,
    /// Drafts skipped because a required field was blank.
    pub skipped: usize,
}

/// Column used to order patients client-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Id,
    FirstName,
    #[default]
    LastName,
    Dob,
    Gender,
    Email,
    Phone,
    Address,
    MedicalHistory,
    CreatedAt,
}

impl SortKey {
    const ALL: [SortKey; 10] = [
        Self::Id,
        Self::FirstName,
        Self::LastName,
        Self::Dob,
        Self::Gender,
        Self::Email,
        Self::Phone,
        Self::Address,
        Self::MedicalHistory,
        Self::CreatedAt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Dob => "dob",
            Self::Gender => "gender",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::MedicalHistory => "medicalHistory",
            Self::CreatedAt => "createdAt",
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown sort key `{trimmed}`"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Use-case service wrapper for patient operations.
pub struct PatientService<R: PatientRepository> {
    repo: R,
}

impl<R: PatientRepository> PatientService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub async fn list_all(&self) -> RepoResult<Vec<Patient>> {
        self.repo.list_all().await
    }

    pub async fn search_by_name(&self, term: &str) -> RepoResult<Vec<Patient>> {
        self.repo.search_by_name(term).await
    }

    /// Lists every patient for a blank term, otherwise searches by name.
    pub async fn search_or_list(&self, term: &str) -> RepoResult<Vec<Patient>> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return self.repo.list_all().await;
        }
        self.repo.search_by_name(trimmed).await
    }

    pub async fn create(&self, draft: &PatientDraft) -> RepoResult<PatientId> {
        self.repo.create(draft).await
    }

    pub async fn update(&self, id: PatientId, changes: &PatientUpdate) -> RepoResult<Patient> {
        self.repo.update(id, changes).await
    }

    /// Returns `Ok(None)` when `id` does not name exactly one patient.
    pub async fn delete(&self, id: PatientId) -> RepoResult<Option<PatientId>> {
        self.repo.delete(id).await
    }

    /// Registers already-normalized drafts one by one.
    ///
    /// # Contract
    /// - Drafts with a blank required field are skipped and counted.
    /// - The first repository failure stops the import and is returned;
    ///   drafts registered before it stay committed.
    pub async fn import_drafts<I>(&self, drafts: I) -> RepoResult<ImportReport>
    where
        I: IntoIterator<Item = PatientDraft>,
    {
        let mut report = ImportReport::default();
        for draft in drafts.into_iter().collect::<Vec<_>>() {
            let missing = draft.missing_required_fields();
            if !missing.is_empty() {
                warn!(
                    "event=patient_import module=service status=skipped missing={}",
                    missing
                        .iter()
                        .map(|field| field.column())
                        .collect::<Vec<_>>()
                        .join(",")
                );
                report.skipped += 1;
                continue;
            }
            self.repo.create(&draft).await?;
            report.registered += 1;
        }

        info!(
            "event=patient_import module=service status=ok registered={} skipped={}",
            report.registered, report.skipped
        );
        Ok(report)
    }
}

/// Sorts patients in place; nulls order last when ascending.
///
/// Text compares case-insensitively first, then by raw value, so the order
/// is total and stable across runs.
pub fn sort_patients(patients: &mut [Patient], key: SortKey, order: SortOrder) {
    patients.sort_by(|a, b| {
        let ordering = compare_by_key(a, b, key);
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

fn compare_by_key(a: &Patient, b: &Patient, key: SortKey) -> Ordering {
    match key {
        SortKey::Id => a.id.cmp(&b.id),
        SortKey::FirstName => compare_text(Some(&a.first_name), Some(&b.first_name)),
        SortKey::LastName => compare_text(Some(&a.last_name), Some(&b.last_name)),
        SortKey::Dob => compare_text(Some(&a.dob), Some(&b.dob)),
        SortKey::Gender => compare_text(Some(&a.gender), Some(&b.gender)),
        SortKey::Email => compare_text(a.email.as_ref(), b.email.as_ref()),
        SortKey::Phone => compare_text(a.phone.as_ref(), b.phone.as_ref()),
        SortKey::Address => compare_text(a.address.as_ref(), b.address.as_ref()),
        SortKey::MedicalHistory => {
            compare_text(a.medical_history.as_ref(), b.medical_history.as_ref())
        }
        SortKey::CreatedAt => compare_text(Some(&a.created_at), Some(&b.created_at)),
    }
}

fn compare_text(a: Option<&String>, b: Option<&String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::{sort_patients, SortKey, SortOrder};
    use crate::model::patient::Patient;

    fn patient(id: i64, first: &str, last: &str, email: Option<&str>) -> Patient {
        Patient {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            dob: "1990-01-01".to_string(),
            gender: "female".to_string(),
            email: email.map(str::to_string),
            phone: None,
            address: None,
            medical_history: None,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    fn ids(patients: &[Patient]) -> Vec<i64> {
        patients.iter().map(|p| p.id).collect()
    }

    #[test]
    fn sorts_text_case_insensitively() {
        let mut patients = vec![
            patient(1, "bob", "zed", None),
            patient(2, "Ann", "adams", None),
            patient(3, "carl", "Baker", None),
        ];
        sort_patients(&mut patients, SortKey::LastName, SortOrder::Ascending);
        assert_eq!(ids(&patients), vec![2, 3, 1]);

        sort_patients(&mut patients, SortKey::LastName, SortOrder::Descending);
        assert_eq!(ids(&patients), vec![1, 3, 2]);
    }

    #[test]
    fn nulls_sort_last_ascending_and_first_descending() {
        let mut patients = vec![
            patient(1, "a", "a", None),
            patient(2, "b", "b", Some("b@example.com")),
            patient(3, "c", "c", Some("a@example.com")),
        ];
        sort_patients(&mut patients, SortKey::Email, SortOrder::Ascending);
        assert_eq!(ids(&patients), vec![3, 2, 1]);

        sort_patients(&mut patients, SortKey::Email, SortOrder::Descending);
        assert_eq!(ids(&patients), vec![1, 2, 3]);
    }

    #[test]
    fn sort_key_parses_column_names() {
        assert_eq!("LASTNAME".parse::<SortKey>().unwrap(), SortKey::LastName);
        assert_eq!("createdAt".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert!("ssn".parse::<SortKey>().is_err());
        assert_eq!(SortKey::default(), SortKey::LastName);
    }
}
