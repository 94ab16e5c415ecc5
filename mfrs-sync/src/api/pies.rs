//! Risk pie retrieval
//!
//! Risk assessments on the FHIR server reference their pies by URL
//! (`<pie base>/<pie id>`); this endpoint serves those references.

use axum::{
    extract::{Path, State},
    Json,
};
use mfrs_common::Pie;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /pies/:id
///
/// 400 if the ID is not a valid pie ID, 404 if no such pie is stored.
pub async fn get_pie(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Pie>> {
    let pie_id = Pie::parse_id(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid pie ID: {}", id)))?;

    let pie = state
        .pies
        .find_by_id(pie_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Pie {}", pie_id)))?;

    Ok(Json(pie))
}
