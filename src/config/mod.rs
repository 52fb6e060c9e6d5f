use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub provisioning: ProvisioningConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Max tenants a single remote instance may host.
    pub instance_capacity: i32,
    /// Timeout applied to every remote HTTP call.
    pub request_timeout_secs: u64,
    /// Shared API key sent to every remote instance, if the pool requires one.
    pub api_key: Option<String>,
    /// Public base URL of this service, used when configuring instance webhooks.
    pub webhook_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Delay before each pairing-artifact fetch attempt, in milliseconds.
    /// The number of entries is the number of attempts per round.
    pub retry_delays_ms: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_ENABLE_CORS") {
            self.server.enable_cors = v.parse().unwrap_or(self.server.enable_cors);
        }

        if let Ok(v) = env::var("GATEWAY_INSTANCE_CAPACITY") {
            self.gateway.instance_capacity = v.parse().unwrap_or(self.gateway.instance_capacity);
        }
        if let Ok(v) = env::var("GATEWAY_REQUEST_TIMEOUT_SECS") {
            self.gateway.request_timeout_secs =
                v.parse().unwrap_or(self.gateway.request_timeout_secs);
        }
        if let Ok(v) = env::var("GATEWAY_API_KEY") {
            if !v.is_empty() {
                self.gateway.api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("GATEWAY_WEBHOOK_BASE_URL") {
            self.gateway.webhook_base_url = v.trim_end_matches('/').to_string();
        }

        if let Ok(v) = env::var("PAIRING_RETRY_DELAYS_MS") {
            let delays: Vec<u64> = v.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if !delays.is_empty() {
                self.provisioning.retry_delays_ms = delays;
            }
        }

        if let Ok(v) = env::var("SWEEP_ENABLED") {
            self.sweep.enabled = v.parse().unwrap_or(self.sweep.enabled);
        }
        if let Ok(v) = env::var("SWEEP_INTERVAL_SECS") {
            self.sweep.interval_secs = v.parse().unwrap_or(self.sweep.interval_secs);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            gateway: GatewayConfig {
                instance_capacity: 100,
                request_timeout_secs: 10,
                api_key: None,
                webhook_base_url: "http://localhost:3000".to_string(),
            },
            provisioning: ProvisioningConfig {
                retry_delays_ms: vec![200, 500, 1000],
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                enable_cors: true,
            },
            gateway: GatewayConfig {
                instance_capacity: 100,
                request_timeout_secs: 8,
                api_key: None,
                webhook_base_url: "https://staging.example.com".to_string(),
            },
            provisioning: ProvisioningConfig {
                retry_delays_ms: vec![200, 500, 1000],
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 60,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                enable_cors: false,
            },
            gateway: GatewayConfig {
                instance_capacity: 100,
                request_timeout_secs: 5,
                api_key: None,
                webhook_base_url: "https://app.example.com".to_string(),
            },
            provisioning: ProvisioningConfig {
                retry_delays_ms: vec![200, 500, 1000],
            },
            sweep: SweepConfig {
                enabled: true,
                interval_secs: 30,
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.request_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_secs)
    }
}
