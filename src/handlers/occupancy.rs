use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/instances/occupancy - per-instance load for capacity planning
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let occupancy = state.allocator().instance_occupancy().await?;
    Ok(Json(json!({ "success": true, "data": occupancy })))
}
