use axum::{extract::Path, extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::gateway::session_name;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub to: String,
    pub body: String,
}

/// POST /api/tenants/:tenant/messages - thin passthrough to the tenant's
/// session. No templating or formatting; content is the caller's business.
pub async fn send(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(message): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    if message.to.is_empty() || message.body.is_empty() {
        return Err(ApiError::BadRequest(
            "both 'to' and 'body' are required".to_string(),
        ));
    }

    let Some(binding) = state.store().get_binding(&tenant).await.map_err(ApiError::from)? else {
        return Err(ApiError::NotAllocated(tenant));
    };
    if !binding.connected {
        return Err(ApiError::BadRequest(format!(
            "tenant {tenant} has no connected session"
        )));
    }
    let Some(client) = state.clients().get(binding.instance_id) else {
        tracing::error!(
            tenant_id = %tenant,
            instance_id = binding.instance_id,
            "binding points at instance with no client handle"
        );
        return Err(ApiError::InternalServerError(
            "internal state inconsistency".to_string(),
        ));
    };

    client
        .send_text(&session_name(&tenant), &message.to, &message.body)
        .await
        .map_err(|e| ApiError::RemoteUnreachable(e.to_string()))?;

    Ok(Json(json!({ "success": true, "data": { "sent": true } })))
}
