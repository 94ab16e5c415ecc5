//! mfrs-sync library - REDCap to FHIR risk assessment sync
//!
//! Pulls risk stratification surveys from REDCap, turns each complete
//! survey into a risk pie and a FHIR RiskAssessment, and keeps each
//! patient's assessments on the FHIR server in step with the surveys.
//! Refreshes run on a cron schedule and on demand over HTTP.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use db::PieStore;
use services::RefreshService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Stored risk pies
    pub pies: PieStore,
    /// Refresh orchestrator, shared with the scheduler
    pub refresh: Arc<RefreshService>,
}

impl AppState {
    pub fn new(pies: PieStore, refresh: Arc<RefreshService>) -> Self {
        Self { pies, refresh }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/refresh", post(api::trigger_refresh))
        .route("/pies/:id", get(api::get_pie))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
