//! Services for mfrs-sync
//!
//! Upstream clients (REDCap, FHIR), the identity resolver and reconciler
//! built on them, and the refresh orchestrator with its scheduler.

pub mod fhir_client;
pub mod identity_resolver;
pub mod reconciler;
pub mod redcap_client;
pub mod refresh;
pub mod scheduler;

pub use fhir_client::{FhirClient, FhirError};
pub use identity_resolver::{FhirIdentityResolver, IdentityResolver, ResolvedSubject};
pub use reconciler::{AssessmentReconciler, FhirReconciler, ReconcileError, RiskServiceConfig};
pub use redcap_client::{RecordSource, RedcapClient, SourceError};
pub use refresh::RefreshService;
pub use scheduler::schedule_refresh;
