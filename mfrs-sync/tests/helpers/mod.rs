//! Test Helper Utilities
//!
//! Shared fakes for testing mfrs-sync without REDCap or a FHIR server:
//! - [`StaticSource`]: record source returning canned records
//! - [`FakeClinicalServer`]: in-memory patient index and assessment store
//!   implementing both the identity resolver and the reconciler

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use mfrs_common::{AssessmentResult, Pie, Record};
use mfrs_sync::error::SyncError;
use mfrs_sync::services::{
    AssessmentReconciler, FhirError, IdentityResolver, RecordSource, ReconcileError,
    RefreshService, ResolvedSubject, SourceError,
};
use uuid::Uuid;

pub const FHIR_BASE: &str = "http://fhir.test";

/// The three example REDCap records: two for study 1, one for study "a"
pub fn example_records() -> Vec<Record> {
    serde_json::from_str(include_str!(
        "../../../mfrs-common/tests/fixtures/example_records.json"
    ))
    .expect("example records parse")
}

/// Record source returning the same records on every fetch
pub struct StaticSource {
    records: Vec<Record>,
    delay: Duration,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self::with_delay(records, Duration::ZERO)
    }

    /// Source that takes `delay` to answer each fetch
    pub fn with_delay(records: Vec<Record>, delay: Duration) -> Self {
        Self {
            records,
            delay,
            fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Most fetches ever observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

/// Record source whose first fetch never finishes in time
pub struct StallOnceSource {
    records: Vec<Record>,
    calls: AtomicUsize,
}

impl StallOnceSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordSource for StallOnceSource {
    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(self.records.clone())
    }
}

/// Record source that always fails
pub struct FailingSource;

#[async_trait]
impl RecordSource for FailingSource {
    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError> {
        Err(SourceError::ApiError(403, "invalid token".to_string()))
    }
}

/// A risk assessment as held by the fake server
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAssessment {
    pub date: DateTime<Local>,
    pub score: i32,
    pub pie_id: Uuid,
    pub most_recent: bool,
}

/// In-memory stand-in for the FHIR server
///
/// Reconciling replaces all of a patient's assessments and tags only the
/// latest one most recent, the same contract the FHIR reconciler meets.
#[derive(Default)]
pub struct FakeClinicalServer {
    /// Study ID to patient IDs carrying it as an identifier
    patients: HashMap<String, Vec<String>>,
    unavailable: bool,
    assessments: Mutex<HashMap<String, Vec<StoredAssessment>>>,
    pies: Mutex<Vec<Pie>>,
}

impl FakeClinicalServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient with the given study ID as identifier
    pub fn with_patient(mut self, study_id: &str, patient_id: &str) -> Self {
        self.patients
            .entry(study_id.to_string())
            .or_default()
            .push(patient_id.to_string());
        self
    }

    /// Make every patient search fail
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn assessments_for(&self, patient_id: &str) -> Vec<StoredAssessment> {
        self.assessments
            .lock()
            .unwrap()
            .get(patient_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_assessments(&self) -> usize {
        self.assessments.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn pie_count(&self) -> usize {
        self.pies.lock().unwrap().len()
    }

    pub fn pies(&self) -> Vec<Pie> {
        self.pies.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityResolver for FakeClinicalServer {
    async fn resolve(&self, study_id: &str) -> Result<ResolvedSubject, SyncError> {
        if self.unavailable {
            return Err(SyncError::UpstreamUnavailable {
                study_id: study_id.to_string(),
                cause: FhirError::NetworkError("connection refused".to_string()),
            });
        }

        match self.patients.get(study_id).map(Vec::as_slice) {
            None | Some([]) => Err(SyncError::SubjectNotFound(study_id.to_string())),
            Some([id]) => Ok(ResolvedSubject {
                id: id.clone(),
                url: format!("{}/Patient/{}", FHIR_BASE, id),
            }),
            Some(many) => Err(SyncError::AmbiguousSubject {
                study_id: study_id.to_string(),
                count: many.len(),
            }),
        }
    }
}

#[async_trait]
impl AssessmentReconciler for FakeClinicalServer {
    async fn reconcile(
        &self,
        patient_id: &str,
        results: &[AssessmentResult],
    ) -> Result<(), ReconcileError> {
        self.pies
            .lock()
            .unwrap()
            .extend(results.iter().map(|r| r.pie.clone()));

        let last = results.len().checked_sub(1);
        let replacement = results
            .iter()
            .enumerate()
            .map(|(i, r)| StoredAssessment {
                date: r.as_of,
                score: r.score,
                pie_id: r.pie.id,
                most_recent: Some(i) == last,
            })
            .collect();

        self.assessments
            .lock()
            .unwrap()
            .insert(patient_id.to_string(), replacement);
        Ok(())
    }
}

/// Refresh service wired to a fake server, with a generous cycle timeout
pub fn refresh_service(
    source: Arc<dyn RecordSource>,
    server: Arc<FakeClinicalServer>,
) -> RefreshService {
    RefreshService::new(
        source,
        server.clone(),
        server,
        Duration::from_secs(30),
    )
}
