use axum::{extract::Path, extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/tenants/:tenant/pairing-code - provision the session and return
/// the scannable pairing credential
pub async fn issue(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.provisioner().issue_pairing_code(&tenant).await?;

    let warnings: Vec<String> = issued.warnings.iter().map(ToString::to_string).collect();
    Ok(Json(json!({
        "success": true,
        "data": {
            "code": issued.artifact.code,
            "image": issued.artifact.image_base64,
            "warnings": warnings,
        }
    })))
}
