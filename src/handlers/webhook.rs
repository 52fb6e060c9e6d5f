use axum::{extract::Path, extract::State, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /webhooks/:instance_name - inbound push from a remote instance
///
/// Remote-originated input: malformed instance names and payloads for
/// unknown tenants are logged and dropped inside the reconciler, so this
/// handler answers 200 for anything that is at least JSON.
pub async fn inbound(
    State(state): State<AppState>,
    Path(instance_name): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .reconciler()
        .apply_webhook(&instance_name, &payload)
        .await?;
    Ok(Json(json!({ "success": true })))
}
