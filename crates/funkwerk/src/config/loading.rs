use std::path::Path;

use crate::error::FunkwerkError;
use crate::transport::Transport;

use super::types::{BusTopology, FunkwerkConfig};

impl FunkwerkConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, FunkwerkError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FunkwerkError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Config for single-host deployment using IPC sockets.
    pub fn local() -> Self {
        Self {
            broker: Default::default(),
            queues: Default::default(),
        }
    }

    /// Config for distributed deployment using TCP, with queues laid out on
    /// consecutive ports after the broker's.
    pub fn distributed(host: &str, base_port: u16) -> Self {
        Self {
            broker: super::types::BrokerEndpoints {
                frontend: format!("tcp://{host}:{base_port}"),
                backend: format!("tcp://{host}:{}", base_port + 1),
                health: format!("tcp://{host}:{}", base_port + 2),
            },
            queues: super::types::QueueEndpoints {
                registration_requests: format!("tcp://{host}:{}", base_port + 3),
                fulfillment_check_requests: format!("tcp://{host}:{}", base_port + 4),
                fulfillment_check_results: format!("tcp://{host}:{}", base_port + 5),
            },
        }
    }

    /// Resolve the endpoint strings into the transport table handed to the
    /// ISC components.
    pub fn topology(&self) -> Result<BusTopology, FunkwerkError> {
        Ok(BusTopology {
            broker_frontend: parse_endpoint(&self.broker.frontend)?,
            broker_backend: parse_endpoint(&self.broker.backend)?,
            broker_health: parse_endpoint(&self.broker.health)?,
            registration_requests: parse_endpoint(&self.queues.registration_requests)?,
            fulfillment_check_requests: parse_endpoint(&self.queues.fulfillment_check_requests)?,
            fulfillment_check_results: parse_endpoint(&self.queues.fulfillment_check_results)?,
        })
    }

    fn validate(&self) -> Result<(), FunkwerkError> {
        // Resolving the topology exercises every endpoint string.
        self.topology().map(|_| ())
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `FUNKWERK_SECTION_KEY` overrides `section.key`:
    /// - `FUNKWERK_BROKER_FRONTEND` -> `broker.frontend`
    /// - `FUNKWERK_BROKER_BACKEND` -> `broker.backend`
    /// - `FUNKWERK_BROKER_HEALTH` -> `broker.health`
    /// - `FUNKWERK_QUEUES_REGISTRATION_REQUESTS` -> `queues.registration_requests`
    /// - `FUNKWERK_QUEUES_FULFILLMENT_CHECK_REQUESTS` -> `queues.fulfillment_check_requests`
    /// - `FUNKWERK_QUEUES_FULFILLMENT_CHECK_RESULTS` -> `queues.fulfillment_check_results`
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FUNKWERK_BROKER_FRONTEND") {
            self.broker.frontend = v;
        }
        if let Ok(v) = std::env::var("FUNKWERK_BROKER_BACKEND") {
            self.broker.backend = v;
        }
        if let Ok(v) = std::env::var("FUNKWERK_BROKER_HEALTH") {
            self.broker.health = v;
        }
        if let Ok(v) = std::env::var("FUNKWERK_QUEUES_REGISTRATION_REQUESTS") {
            self.queues.registration_requests = v;
        }
        if let Ok(v) = std::env::var("FUNKWERK_QUEUES_FULFILLMENT_CHECK_REQUESTS") {
            self.queues.fulfillment_check_requests = v;
        }
        if let Ok(v) = std::env::var("FUNKWERK_QUEUES_FULFILLMENT_CHECK_RESULTS") {
            self.queues.fulfillment_check_results = v;
        }
    }
}

impl Default for FunkwerkConfig {
    fn default() -> Self {
        Self::local()
    }
}

/// Parse an endpoint string like "ipc:///tmp/foo.sock" or "tcp://host:port"
/// into a [`Transport`].
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Transport, FunkwerkError> {
    if let Some(path) = endpoint.strip_prefix("ipc://") {
        let name = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                FunkwerkError::Config(format!("invalid IPC endpoint: {endpoint}"))
            })?;
        Ok(Transport::ipc(name))
    } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
        let (host, port_str) = addr.rsplit_once(':').ok_or_else(|| {
            FunkwerkError::Config(format!("TCP endpoint missing port: {endpoint}"))
        })?;
        let port = port_str
            .parse()
            .map_err(|_| FunkwerkError::Config(format!("invalid TCP port: {endpoint}")))?;
        Ok(Transport::tcp(host, port))
    } else {
        Err(FunkwerkError::Config(format!(
            "unsupported endpoint scheme: {endpoint}"
        )))
    }
}
