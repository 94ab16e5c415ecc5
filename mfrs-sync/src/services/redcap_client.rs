//! REDCap API client
//!
//! Exports the risk stratification project's records with a single
//! form-encoded POST.

use std::time::Duration;

use async_trait::async_trait;
use mfrs_common::Record;
use thiserror::Error;

const USER_AGENT: &str = concat!("mfrs-sync/", env!("CARGO_PKG_VERSION"));

/// Fields exported from the risk stratification project
pub const RECORD_FIELDS: &str = "study_id, redcap_event_name, rf_date, rf_cmc_risk_cat, rf_func_risk_cat, rf_sb_risk_cat, rf_util_risk_cat, rf_risk_predicted";

/// Survey source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Source of raw survey records
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch every record in one pass
    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError>;
}

/// REDCap record export client
pub struct RedcapClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl RedcapClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }

        Ok(Self {
            http_client,
            endpoint,
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecordSource for RedcapClient {
    async fn fetch_records(&self) -> Result<Vec<Record>, SourceError> {
        let params = [
            ("token", self.token.as_str()),
            ("content", "record"),
            ("format", "json"),
            ("returnFormat", "json"),
            ("type", "flat"),
            ("fields", RECORD_FIELDS),
        ];

        tracing::debug!(endpoint = %self.endpoint, "Querying REDCap API");

        let response = self
            .http_client
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| SourceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError(status.as_u16(), error_text));
        }

        let records: Vec<Record> = response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))?;

        tracing::info!(records = records.len(), "Fetched REDCap records");
        Ok(records)
    }
}
