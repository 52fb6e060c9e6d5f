use axum::{extract::Path, extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/tenants/:tenant/allocation - bind the tenant to an instance
pub async fn allocate(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let allocation = state.allocator().allocate(&tenant).await?;

    let warnings: Vec<String> = allocation.warnings.iter().map(ToString::to_string).collect();
    Ok(Json(json!({
        "success": true,
        "data": {
            "tenant_id": allocation.binding.tenant_id,
            "instance_id": allocation.binding.instance_id,
            "warnings": warnings,
        }
    })))
}

/// DELETE /api/tenants/:tenant/allocation - release the tenant's slot
pub async fn release(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.allocator().release(&tenant).await?;
    Ok(Json(json!({ "success": true, "data": { "released": tenant } })))
}
