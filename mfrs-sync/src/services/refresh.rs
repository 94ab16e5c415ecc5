//! Refresh cycle orchestration
//!
//! One cycle fetches every REDCap record, groups them into studies and syncs
//! each study independently. A failure syncing one study is recorded on its
//! [`SyncResult`]; only fetch and grouping failures abort the cycle.
//!
//! Cycles are serialized process-wide: the HTTP trigger and the scheduler
//! share one [`RefreshService`], and a trigger arriving mid-cycle waits for
//! the running cycle to finish before starting its own.

use std::sync::Arc;
use std::time::Duration;

use mfrs_common::config::ServiceConfig;
use mfrs_common::{Study, StudyMap};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::fhir_client::FhirClient;
use super::identity_resolver::{FhirIdentityResolver, IdentityResolver};
use super::reconciler::{AssessmentReconciler, FhirReconciler, RiskServiceConfig};
use super::redcap_client::{RecordSource, RedcapClient};
use crate::db::PieStore;
use crate::error::{RefreshError, SyncError};
use crate::models::SyncResult;

/// Runs refresh cycles one at a time
pub struct RefreshService {
    source: Arc<dyn RecordSource>,
    resolver: Arc<dyn IdentityResolver>,
    reconciler: Arc<dyn AssessmentReconciler>,
    cycle_timeout: Duration,
    /// Held for the whole cycle; tokio's mutex queues waiters in FIFO order
    lock: Mutex<()>,
}

impl RefreshService {
    pub fn new(
        source: Arc<dyn RecordSource>,
        resolver: Arc<dyn IdentityResolver>,
        reconciler: Arc<dyn AssessmentReconciler>,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            source,
            resolver,
            reconciler,
            cycle_timeout,
            lock: Mutex::new(()),
        }
    }

    /// Wire up the REDCap source and FHIR collaborators from configuration
    pub fn from_config(config: &ServiceConfig, pies: PieStore) -> mfrs_common::Result<Self> {
        let source = RedcapClient::new(&config.redcap_url, &config.redcap_token, config.http_timeout)
            .map_err(|e| mfrs_common::Error::Config(format!("REDCap client: {}", e)))?;
        let fhir = Arc::new(
            FhirClient::new(&config.fhir_url, config.http_timeout)
                .map_err(|e| mfrs_common::Error::Config(format!("FHIR client: {}", e)))?,
        );

        let resolver = FhirIdentityResolver::new(Arc::clone(&fhir));
        let reconciler = FhirReconciler::new(
            fhir,
            pies,
            &config.pie_base_url,
            RiskServiceConfig::multi_factor(),
        );

        Ok(Self::new(
            Arc::new(source),
            Arc::new(resolver),
            Arc::new(reconciler),
            config.cycle_timeout,
        ))
    }

    /// Run one complete refresh cycle
    ///
    /// Blocks until any cycle already in flight has finished. The lock is
    /// released on every exit path, including timeout.
    pub async fn refresh(&self) -> Result<Vec<SyncResult>, RefreshError> {
        let _guard = self.lock.lock().await;
        debug!("Acquired refresh lock");

        match tokio::time::timeout(self.cycle_timeout, self.run_cycle()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout = ?self.cycle_timeout, "Refresh cycle timed out");
                Err(RefreshError::Timeout(self.cycle_timeout))
            }
        }
    }

    async fn run_cycle(&self) -> Result<Vec<SyncResult>, RefreshError> {
        let records = self.source.fetch_records().await?;
        let studies = StudyMap::from_records(records)?;
        info!(studies = studies.len(), "Grouped REDCap records into studies");

        Ok(self.sync_studies(studies).await)
    }

    /// Sync every study, collecting one result per study
    pub async fn sync_studies(&self, studies: StudyMap) -> Vec<SyncResult> {
        let mut results = Vec::with_capacity(studies.len());
        for study in studies {
            results.push(self.sync_study(&study).await);
        }
        results
    }

    /// Resolve, convert and reconcile a single study
    pub async fn sync_study(&self, study: &Study) -> SyncResult {
        let mut result = SyncResult::new(&study.id);

        let subject = match self.resolver.resolve(&study.id).await {
            Ok(subject) => subject,
            Err(e) => {
                warn!(study_id = %study.id, error = %e, "Couldn't resolve study patient");
                result.error = Some(e);
                return result;
            }
        };
        result.fhir_patient_id = subject.id.clone();

        let assessments = study.to_assessment_results(&subject.url);
        if let Err(e) = self.reconciler.reconcile(&subject.id, &assessments).await {
            warn!(study_id = %study.id, patient_id = %subject.id, error = %e, "Couldn't reconcile risk assessments");
            result.error = Some(SyncError::from(e));
            return result;
        }

        result.risk_assessment_count = assessments.len();
        debug!(
            study_id = %study.id,
            patient_id = %subject.id,
            count = result.risk_assessment_count,
            "Synced study"
        );
        result
    }
}
