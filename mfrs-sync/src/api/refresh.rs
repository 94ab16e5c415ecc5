//! On-demand refresh trigger

use axum::{extract::State, Json};
use tracing::{error, info};

use crate::error::ApiResult;
use crate::models::{log_result_summary, SyncResult};
use crate::AppState;

/// POST /refresh
///
/// Runs a full refresh cycle (waiting for any cycle already in flight) and
/// returns one result per study. Per-study failures are reported in the
/// body; only a cycle-level failure turns into an error response.
pub async fn trigger_refresh(State(state): State<AppState>) -> ApiResult<Json<Vec<SyncResult>>> {
    info!("Refresh requested over HTTP");

    let results = state.refresh.refresh().await.map_err(|e| {
        error!("Refresh failed: {}", e);
        e
    })?;
    log_result_summary(&results);

    Ok(Json(results))
}
