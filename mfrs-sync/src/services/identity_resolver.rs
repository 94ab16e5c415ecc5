//! Study ID to FHIR patient resolution
//!
//! The study ID (often the MRN) is stored as a patient identifier on the
//! FHIR server. Exactly one patient must match.

use std::sync::Arc;

use async_trait::async_trait;

use super::fhir_client::{FhirClient, FhirError};
use crate::error::SyncError;

/// A study's patient on the FHIR server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubject {
    /// Server-assigned patient ID
    pub id: String,
    /// Absolute patient URL, recorded on every pie
    pub url: String,
}

/// Maps study IDs to FHIR patients
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a study ID to exactly one patient
    ///
    /// # Errors
    /// - `SubjectNotFound` when no patient matches
    /// - `AmbiguousSubject` when several match
    /// - `UpstreamUnavailable` when the server can't be queried
    async fn resolve(&self, study_id: &str) -> Result<ResolvedSubject, SyncError>;
}

/// Resolver backed by a FHIR patient search
pub struct FhirIdentityResolver {
    client: Arc<FhirClient>,
}

impl FhirIdentityResolver {
    pub fn new(client: Arc<FhirClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityResolver for FhirIdentityResolver {
    async fn resolve(&self, study_id: &str) -> Result<ResolvedSubject, SyncError> {
        let entries = self
            .client
            .search_patients_by_identifier(study_id)
            .await
            .map_err(|cause| SyncError::UpstreamUnavailable {
                study_id: study_id.to_string(),
                cause,
            })?;

        match entries.as_slice() {
            [] => Err(SyncError::SubjectNotFound(study_id.to_string())),
            [entry] => {
                let id = entry.resource_id().ok_or_else(|| SyncError::UpstreamUnavailable {
                    study_id: study_id.to_string(),
                    cause: FhirError::ParseError(
                        "patient search entry has no resource id".to_string(),
                    ),
                })?;
                tracing::debug!(study_id, patient_id = id, "Resolved study to patient");
                Ok(ResolvedSubject {
                    id: id.to_string(),
                    url: self.client.patient_url(id),
                })
            }
            many => Err(SyncError::AmbiguousSubject {
                study_id: study_id.to_string(),
                count: many.len(),
            }),
        }
    }
}
