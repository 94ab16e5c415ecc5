//! Risk assessment reconciliation
//!
//! Replaces every risk assessment this service previously stored for a
//! patient with one assessment per result, in a single FHIR transaction.
//! Only the latest assessment carries the `MOST_RECENT` tag.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use mfrs_common::AssessmentResult;
use thiserror::Error;

use super::fhir_client::{FhirClient, FhirError};
use crate::db::PieStore;
use crate::models::fhir::{
    Bundle, BundleEntry, BundleRequest, CodeableConcept, Coding, Meta, Prediction, Reference,
    RiskAssessment,
};

pub const MOST_RECENT_TAG_SYSTEM: &str = "http://interventionengine.org/tags/";
pub const MOST_RECENT_TAG_CODE: &str = "MOST_RECENT";

/// Reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Couldn't store pie: {0}")]
    Store(#[from] mfrs_common::Error),

    #[error("Couldn't encode risk assessment: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Couldn't post risk assessments: {0}")]
    Fhir(#[from] FhirError),
}

/// Fixed description of the risk assessments this service produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskServiceConfig {
    pub name: String,
    pub method: CodeableConcept,
    pub predicted_outcome: CodeableConcept,
}

impl RiskServiceConfig {
    /// The multi-factor risk stratification service
    pub fn multi_factor() -> Self {
        Self {
            name: "Multi-Factor Risk Service".to_string(),
            method: CodeableConcept {
                coding: vec![Coding {
                    system: "http://interventionengine.org/risk-assessments".to_string(),
                    code: "MultiFactor".to_string(),
                }],
                text: Some("Multi-Factor".to_string()),
            },
            predicted_outcome: CodeableConcept {
                coding: Vec::new(),
                text: Some("Catastrophic Health Event".to_string()),
            },
        }
    }

    /// `system|code` token identifying this service's assessments in searches
    fn method_token(&self) -> String {
        self.method
            .coding
            .first()
            .map(|c| format!("{}|{}", c.system, c.code))
            .unwrap_or_default()
    }
}

/// Stores a patient's assessment results
///
/// Implementations must make the operation idempotent: previously stored
/// assessments for the patient are replaced, never duplicated, and only the
/// result with the latest `as_of` is tagged most recent.
#[async_trait]
pub trait AssessmentReconciler: Send + Sync {
    /// `results` must be sorted ascending by `as_of`
    async fn reconcile(
        &self,
        patient_id: &str,
        results: &[AssessmentResult],
    ) -> Result<(), ReconcileError>;
}

/// Reconciler writing pies locally and risk assessments to a FHIR server
pub struct FhirReconciler {
    client: Arc<FhirClient>,
    pies: PieStore,
    pie_base_url: String,
    config: RiskServiceConfig,
}

impl FhirReconciler {
    pub fn new(
        client: Arc<FhirClient>,
        pies: PieStore,
        pie_base_url: impl Into<String>,
        config: RiskServiceConfig,
    ) -> Self {
        Self {
            client,
            pies,
            pie_base_url: pie_base_url.into().trim_end_matches('/').to_string(),
            config,
        }
    }

    /// Build the transaction replacing all of a patient's assessments
    pub fn build_transaction(
        &self,
        patient_id: &str,
        results: &[AssessmentResult],
    ) -> Result<Bundle, ReconcileError> {
        let mut bundle = Bundle::transaction();

        bundle.entry.push(BundleEntry {
            full_url: None,
            resource: None,
            request: Some(BundleRequest {
                method: "DELETE".to_string(),
                url: format!(
                    "RiskAssessment?patient={}&method={}",
                    urlencoding::encode(patient_id),
                    urlencoding::encode(&self.config.method_token())
                ),
            }),
            response: None,
        });

        let last = results.len().checked_sub(1);
        for (i, result) in results.iter().enumerate() {
            let assessment = self.risk_assessment(patient_id, result, Some(i) == last);
            bundle.entry.push(BundleEntry {
                full_url: None,
                resource: Some(serde_json::to_value(&assessment)?),
                request: Some(BundleRequest {
                    method: "POST".to_string(),
                    url: "RiskAssessment".to_string(),
                }),
                response: None,
            });
        }

        Ok(bundle)
    }

    fn risk_assessment(
        &self,
        patient_id: &str,
        result: &AssessmentResult,
        most_recent: bool,
    ) -> RiskAssessment {
        let meta = most_recent.then(|| Meta {
            tag: vec![Coding {
                system: MOST_RECENT_TAG_SYSTEM.to_string(),
                code: MOST_RECENT_TAG_CODE.to_string(),
            }],
        });

        RiskAssessment {
            resource_type: "RiskAssessment".to_string(),
            id: None,
            meta,
            subject: Reference {
                reference: format!("Patient/{}", patient_id),
            },
            date: DateTime::<FixedOffset>::from(result.as_of),
            method: self.config.method.clone(),
            basis: vec![Reference {
                reference: format!("{}/{}", self.pie_base_url, result.pie.id),
            }],
            prediction: vec![Prediction {
                outcome: self.config.predicted_outcome.clone(),
                probability_decimal: Some(f64::from(result.score)),
            }],
        }
    }
}

#[async_trait]
impl AssessmentReconciler for FhirReconciler {
    async fn reconcile(
        &self,
        patient_id: &str,
        results: &[AssessmentResult],
    ) -> Result<(), ReconcileError> {
        for result in results {
            self.pies.save(&result.pie).await?;
        }

        let bundle = self.build_transaction(patient_id, results)?;
        self.client.post_transaction(&bundle).await?;

        tracing::debug!(
            patient_id,
            service = %self.config.name,
            count = results.len(),
            "Reconciled risk assessments"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory_pool;
    use chrono::{Local, TimeZone};
    use mfrs_common::{Pie, Slice};
    use std::time::Duration;

    async fn reconciler() -> FhirReconciler {
        let client = Arc::new(FhirClient::new("http://fhir:3001", Duration::from_secs(5)).unwrap());
        let pies = PieStore::new(init_in_memory_pool().await.unwrap());
        FhirReconciler::new(client, pies, "http://risk:9000/pies/", RiskServiceConfig::multi_factor())
    }

    fn result(day: u32, score: i32) -> AssessmentResult {
        AssessmentResult {
            as_of: Local.with_ymd_and_hms(2016, 4, day, 0, 0, 0).unwrap(),
            score,
            pie: Pie::new("http://fhir:3001/Patient/p1", vec![Slice::new("Clinical Risk", score)]),
        }
    }

    fn assessment(entry: &BundleEntry) -> RiskAssessment {
        serde_json::from_value(entry.resource.clone().expect("resource")).unwrap()
    }

    #[tokio::test]
    async fn test_transaction_replaces_and_tags_latest() {
        let reconciler = reconciler().await;
        let results = vec![result(1, 2), result(2, 4)];

        let bundle = reconciler.build_transaction("p1", &results).unwrap();
        assert_eq!(bundle.bundle_type.as_deref(), Some("transaction"));
        assert_eq!(bundle.entry.len(), 3);

        let delete = bundle.entry[0].request.as_ref().unwrap();
        assert_eq!(delete.method, "DELETE");
        assert_eq!(
            delete.url,
            "RiskAssessment?patient=p1&method=http%3A%2F%2Finterventionengine.org%2Frisk-assessments%7CMultiFactor"
        );

        let first = assessment(&bundle.entry[1]);
        let second = assessment(&bundle.entry[2]);
        assert!(!first.has_tag(MOST_RECENT_TAG_SYSTEM, MOST_RECENT_TAG_CODE));
        assert!(second.has_tag(MOST_RECENT_TAG_SYSTEM, MOST_RECENT_TAG_CODE));
        assert_eq!(bundle.entry[2].request.as_ref().unwrap().method, "POST");
    }

    #[tokio::test]
    async fn test_delete_url_encodes_patient_id() {
        let reconciler = reconciler().await;
        let bundle = reconciler.build_transaction("a b&c", &[]).unwrap();
        let url = &bundle.entry[0].request.as_ref().unwrap().url;
        assert!(url.starts_with("RiskAssessment?patient=a%20b%26c&method="));
        assert!(!url.contains('|'));
    }

    #[tokio::test]
    async fn test_assessment_fields() {
        let reconciler = reconciler().await;
        let results = vec![result(1, 3)];

        let bundle = reconciler.build_transaction("p1", &results).unwrap();
        let ra = assessment(&bundle.entry[1]);

        assert_eq!(ra.subject.reference, "Patient/p1");
        assert_eq!(ra.date, DateTime::<FixedOffset>::from(results[0].as_of));
        assert!(ra.method.matches_code("http://interventionengine.org/risk-assessments", "MultiFactor"));
        assert_eq!(
            ra.basis[0].reference,
            format!("http://risk:9000/pies/{}", results[0].pie.id)
        );
        assert_eq!(ra.prediction[0].probability_decimal, Some(3.0));
        assert_eq!(
            ra.prediction[0].outcome.text.as_deref(),
            Some("Catastrophic Health Event")
        );
    }

    #[tokio::test]
    async fn test_no_results_still_deletes() {
        let reconciler = reconciler().await;
        let bundle = reconciler.build_transaction("p1", &[]).unwrap();
        assert_eq!(bundle.entry.len(), 1);
        assert_eq!(bundle.entry[0].request.as_ref().unwrap().method, "DELETE");
    }
}
