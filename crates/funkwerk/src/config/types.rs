use serde::{Deserialize, Serialize};

use crate::messages::topics;
use crate::transport::Transport;

// ── Top-level config ────────────────────────────────────────────────

/// Full configuration for the funkwerk messaging layer.
///
/// Parsed from `funkwerk.toml` with support for environment variable
/// overrides. Defines the broker endpoints and the point-to-point queue
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunkwerkConfig {
    /// Fanout broker (PUB/SUB) endpoints.
    #[serde(default)]
    pub broker: BrokerEndpoints,

    /// Point-to-point queue endpoints.
    #[serde(default)]
    pub queues: QueueEndpoints,
}

// ── Section configs ─────────────────────────────────────────────────

/// Broker section: the central fanout hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEndpoints {
    /// Endpoint where publishers send messages (broker binds SUB here).
    #[serde(default = "default_broker_frontend")]
    pub frontend: String,

    /// Endpoint where subscribers receive messages (broker binds PUB here).
    #[serde(default = "default_broker_backend")]
    pub backend: String,

    /// Liveness probe endpoint (broker binds REP here).
    #[serde(default = "default_broker_health")]
    pub health: String,
}

fn default_broker_frontend() -> String {
    "ipc:///tmp/vigil/broker-frontend.sock".into()
}

fn default_broker_backend() -> String {
    "ipc:///tmp/vigil/broker-backend.sock".into()
}

fn default_broker_health() -> String {
    "ipc:///tmp/vigil/broker-health.sock".into()
}

impl Default for BrokerEndpoints {
    fn default() -> Self {
        Self {
            frontend: default_broker_frontend(),
            backend: default_broker_backend(),
            health: default_broker_health(),
        }
    }
}

/// Queue section: one endpoint per fixed queue name.
///
/// The queue names themselves are constants in
/// [`topics`](crate::messages::topics); only where each queue lives on the
/// network is configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEndpoints {
    #[serde(default = "default_registration_requests")]
    pub registration_requests: String,

    #[serde(default = "default_fulfillment_check_requests")]
    pub fulfillment_check_requests: String,

    #[serde(default = "default_fulfillment_check_results")]
    pub fulfillment_check_results: String,
}

fn ipc_endpoint(queue_name: &str) -> String {
    format!("ipc:///tmp/vigil/{queue_name}.sock")
}

fn default_registration_requests() -> String {
    ipc_endpoint(topics::SD_INSTANCE_REGISTRATION_REQUESTS)
}

fn default_fulfillment_check_requests() -> String {
    ipc_endpoint(topics::KPI_FULFILLMENT_CHECK_REQUESTS)
}

fn default_fulfillment_check_results() -> String {
    ipc_endpoint(topics::KPI_FULFILLMENT_CHECK_RESULTS)
}

impl Default for QueueEndpoints {
    fn default() -> Self {
        Self {
            registration_requests: default_registration_requests(),
            fulfillment_check_requests: default_fulfillment_check_requests(),
            fulfillment_check_results: default_fulfillment_check_results(),
        }
    }
}

// ── Resolved topology ───────────────────────────────────────────────

/// Resolved endpoint table passed into the ISC components at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTopology {
    pub broker_frontend: Transport,
    pub broker_backend: Transport,
    pub broker_health: Transport,
    pub registration_requests: Transport,
    pub fulfillment_check_requests: Transport,
    pub fulfillment_check_results: Transport,
}
