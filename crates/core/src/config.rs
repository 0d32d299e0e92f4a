use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Process-level configuration shared by every vigil service binary.
///
/// Bus endpoints live in `funkwerk.toml` (see vigil-funkwerk); this struct
/// only carries the knobs common to all workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            service: ServiceConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            bus_config = %self.service.bus_config_path,
            health_interval_secs = self.service.health_interval_secs,
            shutdown_timeout_secs = self.service.shutdown_timeout_secs,
            "config loaded"
        );
    }
}

// ── Service ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the funkwerk bus config file.
    pub bus_config_path: String,
    /// Interval between worker health heartbeats.
    pub health_interval_secs: u64,
    /// Maximum time to wait for in-flight work during shutdown.
    pub shutdown_timeout_secs: u64,
}

impl ServiceConfig {
    fn from_env() -> Self {
        Self {
            bus_config_path: env_or("FUNKWERK_CONFIG", "config/funkwerk.toml"),
            health_interval_secs: env_u64("VIGIL_HEALTH_INTERVAL", 30),
            shutdown_timeout_secs: env_u64("VIGIL_SHUTDOWN_TIMEOUT", 10),
        }
    }
}
