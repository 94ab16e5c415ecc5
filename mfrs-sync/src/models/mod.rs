//! Data models for mfrs-sync

pub mod fhir;
pub mod sync_result;

pub use sync_result::{log_result_summary, ResultSummary, SyncResult};
