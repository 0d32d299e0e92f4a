//! Worker trait and lifecycle management.
//!
//! Provides the [`Worker`] trait for long-running queue consumers,
//! [`WorkerBuilder`] for configuration, and [`WorkerRunner`] for executing
//! the lifecycle with automatic health heartbeats and graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::FunkwerkError;
use crate::message::Message;
use crate::messages::events::{WorkerHealth, WorkerStatus};
use crate::messages::topics::WORKER_HEALTH;
use crate::traits::EventPublisher;

// ── Worker trait ─────────────────────────────────────────────────────

/// A long-running process that participates in the vigil messaging network.
///
/// Implementors define their startup/shutdown logic. The [`WorkerRunner`]
/// handles health heartbeats, signal handling, and lifecycle supervision.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Called once when the worker starts. Set up subscriptions, open connections, etc.
    async fn start(&self) -> Result<(), FunkwerkError>;

    /// Called once during graceful shutdown. Drain in-flight work, close connections.
    async fn stop(&self) -> Result<(), FunkwerkError>;

    /// Human-readable name for this worker (used in heartbeats and logging).
    fn name(&self) -> &str;
}

// ── WorkerBuilder ────────────────────────────────────────────────────

/// Builder for a [`WorkerRunnerConfig`].
pub struct WorkerBuilder {
    name: String,
    health_interval: Duration,
    shutdown_timeout: Duration,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Set the interval between health heartbeats (default: 30s).
    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Set the maximum time to wait for in-flight work during shutdown (default: 5s).
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> WorkerRunnerConfig {
        WorkerRunnerConfig {
            name: self.name,
            health_interval: self.health_interval,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

/// Configuration produced by [`WorkerBuilder`], consumed by [`WorkerRunner`].
pub struct WorkerRunnerConfig {
    pub name: String,
    pub health_interval: Duration,
    pub shutdown_timeout: Duration,
}

// ── WorkerRunner ─────────────────────────────────────────────────────

/// Runs a [`Worker`] with automatic health heartbeats and graceful shutdown.
///
/// The runner manages three concurrent tasks:
/// 1. **Heartbeat loop** — publishes [`WorkerHealth`] at a configured interval
/// 2. **Signal handler** — listens for SIGINT/SIGTERM and initiates shutdown
/// 3. **Worker lifecycle** — calls `start()`, waits for shutdown, then calls `stop()`
pub struct WorkerRunner;

impl WorkerRunner {
    /// Run a worker to completion.
    ///
    /// Blocks until a shutdown signal is received or `shutdown_notify` is
    /// triggered. The `publisher` is used for heartbeats — it should be
    /// connected to the broker.
    pub async fn run(
        worker: Arc<dyn Worker>,
        publisher: Arc<dyn EventPublisher>,
        config: WorkerRunnerConfig,
        shutdown_notify: Option<Arc<Notify>>,
    ) -> Result<(), FunkwerkError> {
        let worker_name = config.name.clone();
        info!(worker = %worker_name, "starting worker");

        worker.start().await?;
        info!(worker = %worker_name, "worker started");

        // Publish initial heartbeat.
        Self::publish_health(&*publisher, &worker_name, WorkerStatus::Healthy).await;

        let shutdown = Arc::new(Notify::new());

        // Spawn heartbeat loop.
        let health_shutdown = shutdown.clone();
        let health_publisher = publisher.clone();
        let health_name = worker_name.clone();
        let health_interval = config.health_interval;
        let health_handle = tokio::spawn(async move {
            Self::health_loop(
                &*health_publisher,
                &health_name,
                health_interval,
                &health_shutdown,
            )
            .await;
        });

        // Wait for shutdown signal (OS signal or programmatic notify).
        let external_shutdown = shutdown_notify.clone();
        let sig_shutdown = shutdown.clone();
        let sig_name = worker_name.clone();
        let signal_handle = tokio::spawn(async move {
            Self::wait_for_shutdown(external_shutdown).await;
            info!(worker = %sig_name, "shutdown signal received");
            sig_shutdown.notify_waiters();
        });

        shutdown.notified().await;

        health_handle.abort();
        signal_handle.abort();

        // Graceful shutdown: stop the worker with timeout.
        info!(worker = %worker_name, timeout = ?config.shutdown_timeout, "stopping worker");
        match tokio::time::timeout(config.shutdown_timeout, worker.stop()).await {
            Ok(Ok(())) => {
                info!(worker = %worker_name, "worker stopped gracefully");
            }
            Ok(Err(e)) => {
                warn!(worker = %worker_name, error = %e, "worker stop returned error");
            }
            Err(_) => {
                warn!(worker = %worker_name, "worker stop timed out, forcing shutdown");
            }
        }

        // Final heartbeat: unhealthy (going down).
        Self::publish_health(&*publisher, &worker_name, WorkerStatus::Unhealthy).await;

        info!(worker = %worker_name, "worker shutdown complete");
        Ok(())
    }

    /// Periodically publish heartbeats until shutdown is signalled.
    async fn health_loop(
        publisher: &dyn EventPublisher,
        worker_name: &str,
        interval: Duration,
        shutdown: &Notify,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick (the initial heartbeat was already sent).
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Self::publish_health(publisher, worker_name, WorkerStatus::Healthy).await;
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Publish a single heartbeat message.
    ///
    /// A failed publish is logged and otherwise ignored — heartbeats are
    /// advisory and must never take a worker down.
    pub(crate) async fn publish_health(
        publisher: &dyn EventPublisher,
        worker_name: &str,
        status: WorkerStatus,
    ) {
        let health = WorkerHealth {
            worker_id: worker_name.to_string(),
            status,
        };

        match Message::new(WORKER_HEALTH, &health) {
            Ok(msg) => {
                if let Err(e) = publisher.publish(msg).await {
                    warn!(worker = %worker_name, error = %e, "failed to publish heartbeat");
                }
            }
            Err(e) => {
                warn!(worker = %worker_name, error = %e, "failed to serialize heartbeat");
            }
        }
    }

    /// Wait for either an OS shutdown signal or a programmatic notification.
    async fn wait_for_shutdown(external: Option<Arc<Notify>>) {
        match external {
            Some(notify) => {
                tokio::select! {
                    _ = Self::os_signal() => {}
                    _ = notify.notified() => {}
                }
            }
            None => {
                Self::os_signal().await;
            }
        }
    }

    /// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
    async fn os_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
            let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl_c");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
