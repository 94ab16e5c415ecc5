//! Per-study outcome of a refresh cycle

use serde::{Serialize, Serializer};
use tracing::info;

use crate::error::SyncError;

/// Result (successful or not) of syncing one study's risk assessments
#[derive(Debug)]
pub struct SyncResult {
    pub study_id: String,
    /// FHIR patient ID; empty when the patient could not be resolved
    pub fhir_patient_id: String,
    pub risk_assessment_count: usize,
    pub error: Option<SyncError>,
}

impl SyncResult {
    /// Start a result for a study with nothing synced yet
    pub fn new(study_id: impl Into<String>) -> Self {
        Self {
            study_id: study_id.into(),
            fhir_patient_id: String::new(),
            risk_assessment_count: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Wire shape: errors travel as their message string
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResultWire<'a> {
    #[serde(rename = "studyID", skip_serializing_if = "str::is_empty")]
    study_id: &'a str,
    #[serde(rename = "fhirPatientID", skip_serializing_if = "str::is_empty")]
    fhir_patient_id: &'a str,
    risk_assessment_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Serialize for SyncResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SyncResultWire {
            study_id: &self.study_id,
            fhir_patient_id: &self.fhir_patient_id,
            risk_assessment_count: self.risk_assessment_count,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
        .serialize(serializer)
    }
}

/// Totals over one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub patients: usize,
    pub errors: usize,
    pub risk_assessments: usize,
}

impl ResultSummary {
    pub fn from_results(results: &[SyncResult]) -> Self {
        results.iter().fold(
            Self {
                patients: results.len(),
                ..Self::default()
            },
            |mut summary, result| {
                if result.error.is_some() {
                    summary.errors += 1;
                }
                summary.risk_assessments += result.risk_assessment_count;
                summary
            },
        )
    }
}

/// Log the number of patients, errors and assessments in a cycle
pub fn log_result_summary(results: &[SyncResult]) -> ResultSummary {
    let summary = ResultSummary::from_results(results);
    info!(
        patients = summary.patients,
        errors = summary.errors,
        risk_assessments = summary.risk_assessments,
        "Refreshed risk assessments for {} patients: {} errors, {} risk assessments.",
        summary.patients,
        summary.errors,
        summary.risk_assessments
    );
    summary
}
