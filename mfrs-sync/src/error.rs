//! Error types for mfrs-sync
//!
//! Failures fall into three tiers:
//! - cycle-fatal ([`RefreshError`]): the whole refresh aborts
//! - study-local ([`SyncError`]): recorded on that study's result only
//! - record-local: incomplete records are skipped during conversion and
//!   never surface as errors

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mfrs_common::StudyError;
use serde_json::json;
use thiserror::Error;

use crate::services::fhir_client::FhirError;
use crate::services::reconciler::ReconcileError;
use crate::services::redcap_client::SourceError;

/// Failure syncing a single study
#[derive(Debug, Error)]
pub enum SyncError {
    /// No patient carries the study ID as an identifier
    #[error("Couldn't find patient with Study ID {0}")]
    SubjectNotFound(String),

    /// More than one patient carries the study ID
    #[error("Found too many patients ({count}) with Study ID {study_id}")]
    AmbiguousSubject { study_id: String, count: usize },

    /// The FHIR server could not be queried or its answer decoded
    #[error("Couldn't query FHIR server for patient with Study ID: {study_id}. Error: {cause}")]
    UpstreamUnavailable {
        study_id: String,
        #[source]
        cause: FhirError,
    },

    /// Pies or risk assessments could not be stored
    #[error(transparent)]
    Reconciliation(#[from] ReconcileError),
}

/// Failure aborting a whole refresh cycle
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Couldn't fetch REDCap records: {0}")]
    Fetch(#[from] SourceError),

    #[error("Couldn't group REDCap records into studies: {0}")]
    Grouping(#[from] StudyError),

    #[error("Refresh cycle did not finish within {0:?}")]
    Timeout(Duration),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Refresh cycle failed (500)
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// mfrs-common error
    #[error("Common error: {0}")]
    Common(#[from] mfrs_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Refresh(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "REFRESH_FAILED",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
