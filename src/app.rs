//! Router assembly.

use axum::{
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Allocator boundary
        .merge(tenant_routes())
        .merge(instance_routes())
        // Inbound push from remote instances
        .merge(webhook_routes());

    // Browser access is only useful in environments with a local UI; the
    // production preset turns it off.
    let router = if state.cors_enabled() {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn tenant_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tenants/:tenant/allocation",
            post(handlers::allocation::allocate).delete(handlers::allocation::release),
        )
        .route(
            "/api/tenants/:tenant/pairing-code",
            post(handlers::pairing::issue),
        )
        .route(
            "/api/tenants/:tenant/connection",
            get(handlers::connection::status),
        )
        .route(
            "/api/tenants/:tenant/messages",
            post(handlers::messages::send),
        )
}

fn instance_routes() -> Router<AppState> {
    Router::new().route("/api/instances/occupancy", get(handlers::occupancy::list))
}

fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/:instance_name", post(handlers::webhook::inbound))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Messaging Gateway",
            "version": version,
            "description": "Binds tenants to remote messaging-session instances",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "allocation": "/api/tenants/:tenant/allocation (POST, DELETE)",
                "pairing": "/api/tenants/:tenant/pairing-code (POST)",
                "connection": "/api/tenants/:tenant/connection (GET)",
                "messages": "/api/tenants/:tenant/messages (POST)",
                "occupancy": "/api/instances/occupancy (GET)",
                "webhooks": "/webhooks/:instance_name (POST, instance push)",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store().ping().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
