//! evaluator-worker — KPI evaluation process.
//!
//! Mirrors the directory from fanout broadcasts, consumes
//! `kpi-fulfillment-check-requests`, runs the rule evaluator against the
//! mirrored definitions, and pushes results to
//! `kpi-fulfillment-check-results`.
//!
//! Requests are not served until the initial full-state broadcast has been
//! applied to the mirror.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use vigil_funkwerk::events::KpiFulfillmentCheckRequest;
use vigil_funkwerk::queue::QueueConfig;
use vigil_funkwerk::traits::{EventSubscriber, QueueReceiver, QueueSender};
use vigil_funkwerk::{
    topics, FunkwerkConfig, FunkwerkError, Message, Worker, WorkerBuilder, WorkerRunner,
    ZmqPublisher, ZmqQueueReceiver, ZmqQueueSender, ZmqSubscriber,
};
use vigil_kpi::EvaluationService;

// ── CLI ─────────────────────────────────────────────────────────────

/// Vigil KPI evaluator — mirrors the directory and answers fulfillment checks.
#[derive(Parser, Debug)]
#[command(name = "evaluator-worker", version, about)]
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

// ── EvaluatorWorker ─────────────────────────────────────────────────

struct EvaluatorWorker {
    service: Arc<EvaluationService>,
    subscriber: Arc<ZmqSubscriber>,
    requests: Arc<ZmqQueueReceiver>,
    results: Arc<ZmqQueueSender>,
    shutdown: Arc<Notify>,
}

impl EvaluatorWorker {
    /// Feed directory broadcasts into the mirror until shutdown.
    async fn consume_broadcasts(self: Arc<Self>) {
        loop {
            tokio::select! {
                result = EventSubscriber::recv(self.subscriber.as_ref()) => {
                    match result {
                        Ok(msg) => {
                            if let Err(e) = self.service.apply_broadcast(&msg) {
                                error!(error = %e, topic = %msg.topic, "failed to apply broadcast");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "subscriber recv error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("broadcast consumer shutting down");
                    break;
                }
            }
        }
    }

    /// Serve fulfillment checks until shutdown. Blocks until the mirror has
    /// seen the initial full-state broadcast.
    async fn consume_requests(self: Arc<Self>) {
        self.service.wait_ready().await;
        info!("mirror ready, serving fulfillment checks");

        loop {
            tokio::select! {
                result = self.requests.recv() => {
                    match result {
                        Ok(msg) => {
                            if let Err(e) = self.handle_request(msg).await {
                                error!(error = %e, "failed to handle check request");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "request queue recv error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("request consumer shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_request(&self, msg: Message) -> Result<(), FunkwerkError> {
        let request: KpiFulfillmentCheckRequest =
            msg.decode().map_err(FunkwerkError::Serialization)?;
        let results = self.service.handle_check_request(&request);

        for result in results {
            // Correlate each result with the request that produced it.
            let reply = Message::with_correlation(
                topics::KPI_FULFILLMENT_CHECK_RESULTS,
                &result,
                msg.correlation_id,
            )?;
            self.results.send(reply).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for EvaluatorWorker {
    async fn start(&self) -> Result<(), FunkwerkError> {
        self.subscriber.subscribe(topics::SD_TYPES_UPDATES).await?;
        self.subscriber.subscribe(topics::SD_INSTANCES_UPDATES).await?;
        self.subscriber.subscribe(topics::KPI_DEFINITIONS_UPDATES).await?;
        info!("evaluator worker started, awaiting initial directory state");
        Ok(())
    }

    async fn stop(&self) -> Result<(), FunkwerkError> {
        self.shutdown.notify_waiters();
        info!("evaluator worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "evaluator-worker"
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
    let subscriber = Arc::new(ZmqSubscriber::connect(&topology.broker_backend).await?);
    // The directory service binds both queues; evaluators connect so that
    // any number of them can share the request load.
    let requests =
        Arc::new(ZmqQueueReceiver::connect(&topology.fulfillment_check_requests).await?);
    let results = Arc::new(
        ZmqQueueSender::connect(&topology.fulfillment_check_results, QueueConfig::default())
            .await?,
    );

    let shutdown = Arc::new(Notify::new());
    let worker = Arc::new(EvaluatorWorker {
        service: Arc::new(EvaluationService::new()),
        subscriber,
        requests,
        results,
        shutdown: shutdown.clone(),
    });

    // One consumer task per inbound channel.
    tokio::spawn(worker.clone().consume_broadcasts());
    tokio::spawn(worker.clone().consume_requests());

    let runner_config = WorkerBuilder::new("evaluator-worker")
        .health_interval(Duration::from_secs(cli.health_interval))
        .shutdown_timeout(Duration::from_secs(cli.shutdown_timeout))
        .build();

    info!("evaluator-worker starting");
    WorkerRunner::run(worker, publisher, runner_config, Some(shutdown)).await?;
    info!("evaluator-worker exited cleanly");
    Ok(())
}
