//! directory-worker — the directory service process.
//!
//! Owns the authoritative state directory. Consumes:
//! - `sd-instance-registration-requests` — registers unknown devices
//! - `kpi-fulfillment-check-results` — records evaluator outcomes
//!
//! Publishes the full directory state on the fanout at startup and the
//! affected category set after every mutation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use vigil_directory::DirectoryService;
use vigil_funkwerk::bridge::EventBridge;
use vigil_funkwerk::events::{KpiFulfillmentCheckResult, SdInstanceRegistrationRequest};
use vigil_funkwerk::queue::QueueConfig;
use vigil_funkwerk::traits::QueueReceiver;
use vigil_funkwerk::{
    FunkwerkConfig, FunkwerkError, Message, Worker, WorkerBuilder, WorkerRunner, ZmqPublisher,
    ZmqQueueReceiver, ZmqQueueSender,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Vigil directory service — authoritative SD/KPI registry.
#[derive(Parser, Debug)]
#[command(name = "directory-worker", version, about)]
struct Cli {
    /// Path to funkwerk.toml config file.
    #[arg(long, env = "FUNKWERK_CONFIG", default_value = "config/funkwerk.toml")]
    config: String,

    /// Health heartbeat interval in seconds.
    #[arg(long, env = "VIGIL_HEALTH_INTERVAL", default_value_t = 30)]
    health_interval: u64,

    /// Shutdown timeout in seconds.
    #[arg(long, env = "VIGIL_SHUTDOWN_TIMEOUT", default_value_t = 10)]
    shutdown_timeout: u64,
}

// ── DirectoryWorker ─────────────────────────────────────────────────

/// Wraps the directory service as a funkwerk worker: one consumer task per
/// inbound queue, supervised as a unit.
struct DirectoryWorker {
    service: Arc<DirectoryService>,
    registrations: Arc<ZmqQueueReceiver>,
    results: Arc<ZmqQueueReceiver>,
    /// Bound check-request distributor. The ingestion boundary feeds it via
    /// [`DirectoryService::request_check`] when snapshots arrive.
    #[allow(dead_code)]
    checks: Arc<ZmqQueueSender>,
    shutdown: Arc<Notify>,
}

impl DirectoryWorker {
    async fn handle_registration(&self, msg: Message) -> Result<(), FunkwerkError> {
        let request: SdInstanceRegistrationRequest =
            msg.decode().map_err(FunkwerkError::Serialization)?;
        info!(uid = %request.uid, "registration request received");
        if let Err(e) = self.service.handle_registration(&request).await {
            error!(uid = %request.uid, error = %e, "registration failed");
        }
        Ok(())
    }

    async fn handle_result(&self, msg: Message) -> Result<(), FunkwerkError> {
        let result: KpiFulfillmentCheckResult =
            msg.decode().map_err(FunkwerkError::Serialization)?;
        self.service.record_result(&result);
        Ok(())
    }

    /// Drain one queue until shutdown. Transient receive errors are logged
    /// and retried after a short pause; they never take the worker down.
    async fn consume_registrations(self: Arc<Self>) {
        loop {
            tokio::select! {
                result = self.registrations.recv() => {
                    match result {
                        Ok(msg) => {
                            if let Err(e) = self.handle_registration(msg).await {
                                error!(error = %e, "failed to handle registration message");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "registration queue recv error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("registration consumer shutting down");
                    break;
                }
            }
        }
    }

    async fn consume_results(self: Arc<Self>) {
        loop {
            tokio::select! {
                result = self.results.recv() => {
                    match result {
                        Ok(msg) => {
                            if let Err(e) = self.handle_result(msg).await {
                                error!(error = %e, "failed to handle result message");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "result queue recv error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("result consumer shutting down");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl Worker for DirectoryWorker {
    async fn start(&self) -> Result<(), FunkwerkError> {
        self.service.load_from_store().await.map_err(|e| {
            FunkwerkError::Config(format!("failed to seed directory from store: {e}"))
        })?;
        // Initial full-state broadcast: mirrors must not serve before this.
        self.service.broadcast_full_state().await?;
        info!("directory worker started, initial state broadcast");
        Ok(())
    }

    async fn stop(&self) -> Result<(), FunkwerkError> {
        self.shutdown.notify_waiters();
        info!("directory worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "directory-worker"
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    vigil_core::config::load_dotenv();
    let cli = Cli::parse();

    let config = match FunkwerkConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded funkwerk config");
            cfg
        }
        Err(e) => {
            warn!(error = %e, path = %cli.config, "failed to load config, using local defaults");
            FunkwerkConfig::local()
        }
    };
    let topology = config.topology()?;

    let publisher: Arc<ZmqPublisher> =
        Arc::new(ZmqPublisher::connect(&topology.broker_frontend).await?);
    // The directory service is the stable end of every queue: it consumes
    // registrations and results, and distributes check requests.
    let registrations = Arc::new(ZmqQueueReceiver::bind(&topology.registration_requests).await?);
    let results = Arc::new(ZmqQueueReceiver::bind(&topology.fulfillment_check_results).await?);
    let checks = Arc::new(
        ZmqQueueSender::bind(&topology.fulfillment_check_requests, QueueConfig::default()).await?,
    );

    let bridge = Arc::new(EventBridge::default());
    let service = Arc::new(DirectoryService::new(publisher.clone(), bridge));

    let shutdown = Arc::new(Notify::new());
    let worker = Arc::new(DirectoryWorker {
        service,
        registrations,
        results,
        checks,
        shutdown: shutdown.clone(),
    });

    // One consumer task per inbound queue.
    tokio::spawn(worker.clone().consume_registrations());
    tokio::spawn(worker.clone().consume_results());

    let runner_config = WorkerBuilder::new("directory-worker")
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .build();

    info!("directory-worker starting");
    WorkerRunner::run(worker, publisher, runner_config, Some(shutdown)).await?;
    info!("directory-worker exited cleanly");
    Ok(())
}
