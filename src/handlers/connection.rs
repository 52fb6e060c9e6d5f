use axum::{extract::Path, extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/tenants/:tenant/connection - merged connection view
///
/// `source` tells the caller whether this is a live observation or the
/// cached state from before an unreachable instance.
pub async fn status(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.reconciler().refresh(&tenant).await?;
    Ok(Json(json!({ "success": true, "data": status })))
}
