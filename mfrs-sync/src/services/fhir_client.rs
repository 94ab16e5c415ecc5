//! FHIR server client
//!
//! Patient searches (following paged results) and transaction posts.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::ACCEPT;
use thiserror::Error;

use crate::models::fhir::{Bundle, BundleEntry};

const USER_AGENT: &str = concat!("mfrs-sync/", env!("CARGO_PKG_VERSION"));
const FHIR_JSON: &str = "application/json";

/// FHIR client errors
#[derive(Debug, Error)]
pub enum FhirError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Received HTTP {0} from FHIR server: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Paging loop detected at {0}")]
    PagingLoop(String),
}

/// FHIR REST client
pub struct FhirClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl FhirClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FhirError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FhirError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL of a patient resource
    pub fn patient_url(&self, patient_id: &str) -> String {
        format!("{}/Patient/{}", self.base_url, patient_id)
    }

    /// Find all patients with the given identifier, following `next` links
    pub async fn search_patients_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Vec<BundleEntry>, FhirError> {
        let first_page = self
            .http_client
            .get(format!("{}/Patient", self.base_url))
            .query(&[("identifier", identifier)])
            .header(ACCEPT, FHIR_JSON);

        let mut bundle = self.fetch_bundle(first_page).await?;
        let mut entries = std::mem::take(&mut bundle.entry);
        let mut visited = HashSet::new();

        while let Some(next) = bundle.next_link().map(str::to_string) {
            if !visited.insert(next.clone()) {
                return Err(FhirError::PagingLoop(next));
            }
            tracing::debug!(url = %next, "Following next page of patient search");
            let request = self.http_client.get(&next).header(ACCEPT, FHIR_JSON);
            bundle = self.fetch_bundle(request).await?;
            entries.append(&mut bundle.entry);
        }

        Ok(entries)
    }

    /// Post a transaction bundle to the server root
    pub async fn post_transaction(&self, bundle: &Bundle) -> Result<Bundle, FhirError> {
        let request = self
            .http_client
            .post(format!("{}/", self.base_url))
            .header(ACCEPT, FHIR_JSON)
            .json(bundle);

        self.fetch_bundle(request).await
    }

    async fn fetch_bundle(&self, request: reqwest::RequestBuilder) -> Result<Bundle, FhirError> {
        let response = request
            .send()
            .await
            .map_err(|e| FhirError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FhirError::ApiError(status.as_u16(), error_text));
        }

        response
            .json::<Bundle>()
            .await
            .map_err(|e| FhirError::ParseError(e.to_string()))
    }
}
