// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::services::GatewayError;
use crate::store::StoreError;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// The domain taxonomy is preserved in the `code` field so the UI can tell
/// "no capacity right now" (operator-actionable) from "pairing failed,
/// please retry" (tenant-actionable).
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    TenantNotFound(String),

    // 409 Conflict (sequencing error: caller skipped allocation)
    NotAllocated(String),

    // 502 Bad Gateway (remote instance issues)
    PairingUnavailable(String),
    RemoteUnreachable(String),

    // 503 Service Unavailable
    CapacityExhausted,
    ServiceUnavailable(String),

    // 500 Internal Server Error
    InternalServerError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TenantNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotAllocated(_) => StatusCode::CONFLICT,
            ApiError::PairingUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::RemoteUnreachable(_) => StatusCode::BAD_GATEWAY,
            ApiError::CapacityExhausted => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            ApiError::NotAllocated(_) => "NOT_ALLOCATED",
            ApiError::PairingUnavailable(_) => "PAIRING_UNAVAILABLE",
            ApiError::RemoteUnreachable(_) => "REMOTE_UNREACHABLE",
            ApiError::CapacityExhausted => "CAPACITY_EXHAUSTED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::TenantNotFound(tenant) => format!("tenant not found: {tenant}"),
            ApiError::NotAllocated(tenant) => {
                format!("tenant {tenant} is not allocated; allocate first")
            }
            ApiError::PairingUnavailable(tenant) => {
                format!("pairing code unavailable for tenant {tenant}; please retry")
            }
            ApiError::RemoteUnreachable(msg) => msg.clone(),
            ApiError::CapacityExhausted => {
                "no messaging instance has spare capacity".to_string()
            }
            ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::InternalServerError(msg) => msg.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code(),
        })
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::TenantNotFound(tenant) => ApiError::TenantNotFound(tenant),
            GatewayError::CapacityExhausted => ApiError::CapacityExhausted,
            GatewayError::NotAllocated(tenant) => ApiError::NotAllocated(tenant),
            GatewayError::PairingUnavailable(tenant) => ApiError::PairingUnavailable(tenant),
            GatewayError::RemoteUnreachable(msg) => ApiError::RemoteUnreachable(msg),
            GatewayError::Inconsistent(msg) => {
                // Should never happen; keep the real detail in the log only.
                tracing::error!("invariant violation: {msg}");
                ApiError::InternalServerError("internal state inconsistency".to_string())
            }
            GatewayError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => {
                tracing::error!("store lookup miss: {msg}");
                ApiError::InternalServerError("an error occurred while processing your request".to_string())
            }
            StoreError::Unavailable(_) => {
                ApiError::ServiceUnavailable("store temporarily unavailable".to_string())
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return a generic message.
                tracing::error!("sqlx error: {sqlx_err}");
                ApiError::InternalServerError("database error occurred".to_string())
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
