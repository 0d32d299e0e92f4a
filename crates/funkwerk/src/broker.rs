use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use zeromq::prelude::*;
use zeromq::{PubSocket, RepSocket, SubSocket, ZmqMessage};

use crate::transport::Transport;

/// Metrics collected by the broker while forwarding messages.
#[derive(Debug)]
pub struct BrokerMetrics {
    /// Total messages forwarded through the proxy.
    pub total_messages: AtomicU64,
    /// Per-topic message counts.
    pub topic_counts: Mutex<HashMap<String, u64>>,
}

impl BrokerMetrics {
    fn new() -> Self {
        Self {
            total_messages: AtomicU64::new(0),
            topic_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of total forwarded messages.
    pub fn total(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }
}

/// Socket endpoints for the event broker.
#[derive(Debug, Clone)]
pub struct BrokerSockets {
    /// Frontend endpoint where publishers connect (broker binds SUB here).
    pub frontend: Transport,
    /// Backend endpoint where subscribers connect (broker binds PUB here).
    pub backend: Transport,
    /// Health check endpoint (REP socket for liveness probes).
    pub health: Transport,
}

impl BrokerSockets {
    /// Create a local IPC broker configuration.
    pub fn local() -> Self {
        Self {
            frontend: Transport::ipc("broker-frontend"),
            backend: Transport::ipc("broker-backend"),
            health: Transport::ipc("broker-health"),
        }
    }

    /// Create a TCP broker configuration.
    pub fn tcp(host: &str, frontend_port: u16, backend_port: u16, health_port: u16) -> Self {
        Self {
            frontend: Transport::tcp(host, frontend_port),
            backend: Transport::tcp(host, backend_port),
            health: Transport::tcp(host, health_port),
        }
    }
}

impl Default for BrokerSockets {
    fn default() -> Self {
        Self::local()
    }
}

/// Fanout event broker: every message a publisher sends is forwarded to
/// every connected subscriber.
///
/// The broker acts as a central rendezvous point:
/// - Publishers connect to the **frontend** (SUB socket that the broker binds).
/// - Subscribers connect to the **backend** (PUB socket that the broker binds).
/// - Messages received on frontend are forwarded to backend with topic metrics.
///
/// Since `zeromq` 0.4 does not provide XPUB/XSUB socket types, the proxy
/// pattern is emulated with PUB+SUB; the broker subscribes to all topics ("").
pub struct EventBroker {
    sockets: BrokerSockets,
    metrics: Arc<BrokerMetrics>,
    shutdown: Arc<AtomicBool>,
}

impl EventBroker {
    /// Create a new broker with the given socket endpoints.
    pub fn new(sockets: BrokerSockets) -> Self {
        Self {
            sockets,
            metrics: Arc::new(BrokerMetrics::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Access the broker's forwarding metrics.
    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    /// Signal the broker to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Run the broker proxy loop.
    ///
    /// This binds three sockets:
    /// 1. SUB (frontend) — receives from publishers, subscribed to all topics.
    /// 2. PUB (backend) — forwards to subscribers.
    /// 3. REP (health) — responds to liveness pings with "ok".
    ///
    /// Returns when shutdown is signaled or an unrecoverable error occurs.
    pub async fn run(&self) -> Result<(), crate::error::FunkwerkError> {
        for t in [
            &self.sockets.frontend,
            &self.sockets.backend,
            &self.sockets.health,
        ] {
            t.ensure_ipc_dir()
                .map_err(|e| crate::error::FunkwerkError::Transport(e.to_string()))?;
            t.remove_stale_socket()
                .map_err(|e| crate::error::FunkwerkError::Transport(e.to_string()))?;
        }

        // -- Frontend: SUB socket that publishers connect to --
        let mut frontend = SubSocket::new();
        frontend
            .bind(&self.sockets.frontend.endpoint())
            .await
            .map_err(crate::error::FunkwerkError::Zmq)?;
        // Subscribe to all topics so every message is forwarded.
        frontend
            .subscribe("")
            .await
            .map_err(crate::error::FunkwerkError::Zmq)?;

        tracing::info!(
            endpoint = %self.sockets.frontend.endpoint(),
            "broker frontend (SUB) bound — publishers connect here"
        );

        // -- Backend: PUB socket that subscribers connect to --
        let mut backend = PubSocket::new();
        backend
            .bind(&self.sockets.backend.endpoint())
            .await
            .map_err(crate::error::FunkwerkError::Zmq)?;

        tracing::info!(
            endpoint = %self.sockets.backend.endpoint(),
            "broker backend (PUB) bound — subscribers connect here"
        );

        // -- Health check: REP socket --
        let mut health = RepSocket::new();
        health
            .bind(&self.sockets.health.endpoint())
            .await
            .map_err(crate::error::FunkwerkError::Zmq)?;

        tracing::info!(
            endpoint = %self.sockets.health.endpoint(),
            "broker health check (REP) bound"
        );

        // Spawn health check responder in background.
        let shutdown_flag = self.shutdown.clone();
        tokio::spawn(async move {
            Self::health_loop(&mut health, &shutdown_flag).await;
        });

        // -- Main proxy loop --
        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();

        tracing::info!("broker proxy loop started");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                tracing::info!("broker shutting down");
                break;
            }

            // Use a timeout so we periodically check the shutdown flag.
            let recv_result =
                tokio::time::timeout(std::time::Duration::from_millis(100), frontend.recv()).await;

            let msg = match recv_result {
                Ok(Ok(msg)) => msg,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "frontend recv error");
                    continue;
                }
                Err(_) => {
                    // Timeout — loop back to check shutdown flag.
                    continue;
                }
            };

            let topic = extract_topic(&msg);

            metrics.total_messages.fetch_add(1, Ordering::Relaxed);
            {
                let mut counts = metrics.topic_counts.lock().await;
                *counts.entry(topic.clone()).or_insert(0) += 1;
            }

            tracing::debug!(
                topic = %topic,
                total = metrics.total_messages.load(Ordering::Relaxed),
                "forwarding message"
            );

            // Forward to backend (PUB).
            if let Err(e) = backend.send(msg).await {
                tracing::warn!(error = %e, "backend send error");
            }
        }

        tracing::info!(
            total = metrics.total_messages.load(Ordering::Relaxed),
            "broker stopped"
        );

        Ok(())
    }

    /// Health check responder loop — replies "ok" to any request.
    async fn health_loop(health: &mut RepSocket, shutdown: &AtomicBool) {
        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            let recv_result =
                tokio::time::timeout(std::time::Duration::from_millis(500), health.recv()).await;

            match recv_result {
                Ok(Ok(_request)) => {
                    let reply: ZmqMessage = "ok".into();
                    if let Err(e) = health.send(reply).await {
                        tracing::warn!(error = %e, "health reply error");
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "health recv error");
                }
                Err(_) => {
                    // Timeout, loop back.
                }
            }
        }
    }
}

/// Extract a topic string from the first frame of a ZMQ message.
///
/// In ZeroMQ PUB/SUB the first frame carries the topic prefix. Non-UTF-8
/// frames fall back to a hex representation.
fn extract_topic(msg: &ZmqMessage) -> String {
    msg.iter()
        .next()
        .map(|frame| {
            String::from_utf8(frame.to_vec()).unwrap_or_else(|_| hex_encode(frame.as_ref()))
        })
        .unwrap_or_else(|| "<empty>".to_string())
}

/// Minimal hex encoding (avoids pulling in the `hex` crate).
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_sockets_local_endpoints() {
        let cfg = BrokerSockets::local();
        assert!(cfg.frontend.endpoint().contains("broker-frontend"));
        assert!(cfg.backend.endpoint().contains("broker-backend"));
        assert!(cfg.health.endpoint().contains("broker-health"));
    }

    #[test]
    fn broker_sockets_tcp_endpoints() {
        let cfg = BrokerSockets::tcp("0.0.0.0", 5555, 5556, 5557);
        assert_eq!(cfg.frontend.endpoint(), "tcp://0.0.0.0:5555");
        assert_eq!(cfg.backend.endpoint(), "tcp://0.0.0.0:5556");
        assert_eq!(cfg.health.endpoint(), "tcp://0.0.0.0:5557");
    }

    #[test]
    fn metrics_default_zero() {
        let m = BrokerMetrics::new();
        assert_eq!(m.total(), 0);
    }

    #[test]
    fn extract_topic_from_utf8_frame() {
        let msg: ZmqMessage = "vigil.sd-instance.set".into();
        assert_eq!(extract_topic(&msg), "vigil.sd-instance.set");
    }

    #[test]
    fn hex_encode_works() {
        assert_eq!(hex_encode(&[0xde, 0xad]), "dead");
    }
}
