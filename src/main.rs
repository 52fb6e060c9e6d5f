use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{info, warn};

use messaging_gateway::app::app;
use messaging_gateway::config::AppConfig;
use messaging_gateway::gateway::registry::ClientRegistry;
use messaging_gateway::state::AppState;
use messaging_gateway::store::memory::{MemoryDirectory, MemoryStore};
use messaging_gateway::store::models::Instance;
use messaging_gateway::store::postgres::{PgDirectory, PgStore};
use messaging_gateway::store::{GatewayStore, TenantDirectory};
use messaging_gateway::sweep::SweepWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "messaging_gateway=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    info!("starting messaging gateway in {:?} mode", config.environment);

    let (store, directory): (Arc<dyn GatewayStore>, Arc<dyn TenantDirectory>) =
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let pool = PgPoolOptions::new().connect(&url).await?;
                sqlx::migrate!().run(&pool).await?;
                (
                    Arc::new(PgStore::new(pool.clone())),
                    Arc::new(PgDirectory::new(pool)),
                )
            }
            Err(_) => {
                // Local development fallback: instances from GATEWAY_INSTANCES
                // ("1=http://host-a,2=http://host-b"), any tenant id accepted.
                warn!("DATABASE_URL not set, using in-memory store");
                let instances = instances_from_env();
                (
                    Arc::new(MemoryStore::with_instances(instances)),
                    Arc::new(MemoryDirectory::allow_all()),
                )
            }
        };

    let instances = store.list_instances().await?;
    if instances.is_empty() {
        warn!("instance pool is empty; every allocation will fail with capacity exhausted");
    }
    let clients = ClientRegistry::from_instances(
        &instances,
        config.request_timeout(),
        config.gateway.api_key.as_deref(),
    )?;
    info!(instances = clients.len(), "built gateway client registry");

    let state = AppState::new(store, directory, clients, &config);

    // Periodic reconciliation sweep, stopped via the shutdown channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = if config.sweep.enabled {
        let worker = SweepWorker::new(state.reconciler().clone(), config.sweep_interval());
        Some(tokio::spawn(async move { worker.run(shutdown_rx).await }))
    } else {
        None
    };

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{bind_addr}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep_handle {
        let _ = handle.await;
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn instances_from_env() -> Vec<Instance> {
    let Ok(raw) = std::env::var("GATEWAY_INSTANCES") else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|entry| {
            let (id, base_url) = entry.split_once('=')?;
            Some(Instance {
                id: id.trim().parse().ok()?,
                base_url: base_url.trim().to_string(),
                is_active: true,
                tenant_count: 0,
            })
        })
        .collect()
}
