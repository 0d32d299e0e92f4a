//! Evaluator-side service: directory mirror, snapshot cache, and
//! fulfillment-check handling.
//!
//! The mirror is fed exclusively by directory broadcasts and never mutated
//! directly. Requests are not served until the initial full-state broadcast
//! (types and instances) has been applied — before that, the
//! instance-to-type references cannot be trusted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use vigil_core::snapshot::SnapshotCache;
use vigil_directory::store::{Directory, DirectoryDelta};
use vigil_funkwerk::events::{
    KpiDefinitionsUpdate, KpiFulfillmentCheckRequest, KpiFulfillmentCheckResult,
    SdInstancesUpdate, SdTypesUpdate,
};
use vigil_funkwerk::topics;
use vigil_funkwerk::{FunkwerkError, Message};

use crate::evaluator::evaluate;

pub struct EvaluationService {
    mirror: RwLock<Directory>,
    cache: RwLock<SnapshotCache>,
    seen_types: AtomicBool,
    seen_instances: AtomicBool,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl EvaluationService {
    pub fn new() -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            mirror: RwLock::new(Directory::new()),
            cache: RwLock::new(SnapshotCache::new()),
            seen_types: AtomicBool::new(false),
            seen_instances: AtomicBool::new(false),
            ready_tx,
            ready_rx,
        }
    }

    // ── Mirror maintenance ──────────────────────────────────────────

    /// Apply one directory broadcast to the mirror.
    ///
    /// Returns `true` if the delta applied, `false` if it was stale or the
    /// topic is not a directory category. Stale and duplicate deliveries
    /// are expected under at-least-once semantics and handled silently.
    pub fn apply_broadcast(&self, message: &Message) -> Result<bool, FunkwerkError> {
        let delta = match message.topic.as_str() {
            topics::SD_TYPES_UPDATES => {
                let update: SdTypesUpdate = message.decode()?;
                DirectoryDelta::SdTypes(update)
            }
            topics::SD_INSTANCES_UPDATES => {
                let update: SdInstancesUpdate = message.decode()?;
                DirectoryDelta::SdInstances(update)
            }
            topics::KPI_DEFINITIONS_UPDATES => {
                let update: KpiDefinitionsUpdate = message.decode()?;
                DirectoryDelta::KpiDefinitions(update)
            }
            other => {
                debug!(topic = %other, "ignoring non-directory broadcast");
                return Ok(false);
            }
        };

        let applied = {
            let mut mirror = self.mirror.write().expect("mirror lock poisoned");
            mirror.apply_delta(&delta)
        };

        if applied {
            match &delta {
                DirectoryDelta::SdTypes(_) => self.seen_types.store(true, Ordering::SeqCst),
                DirectoryDelta::SdInstances(_) => {
                    self.seen_instances.store(true, Ordering::SeqCst)
                }
                DirectoryDelta::KpiDefinitions(_) => {}
            }
            if self.seen_types.load(Ordering::SeqCst)
                && self.seen_instances.load(Ordering::SeqCst)
                && !*self.ready_rx.borrow()
            {
                info!("initial full-state broadcast applied, mirror ready");
                let _ = self.ready_tx.send(true);
            }
        }
        Ok(applied)
    }

    /// Whether the initial full-state broadcast has been applied.
    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Wait until the mirror is ready to serve requests.
    pub async fn wait_ready(&self) {
        let mut rx = self.ready_rx.clone();
        // Closed sender cannot happen while `self` is alive.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    // ── Fulfillment checks ──────────────────────────────────────────

    /// Evaluate one check request against the mirrored definitions.
    ///
    /// The request's snapshots are folded into the latest-value cache first,
    /// so a request carrying only changed parameters still evaluates against
    /// the full last-known state of the instance.
    pub fn handle_check_request(
        &self,
        request: &KpiFulfillmentCheckRequest,
    ) -> Vec<KpiFulfillmentCheckResult> {
        {
            let mut cache = self.cache.write().expect("cache lock poisoned");
            for snapshot in &request.snapshots {
                cache.record(snapshot.clone());
            }
        }

        let mirror = self.mirror.read().expect("mirror lock poisoned");
        let Some(instance) = mirror.sd_instance_by_uid(&request.sd_instance_uid) else {
            warn!(uid = %request.sd_instance_uid, "check request for unmirrored instance");
            return Vec::new();
        };

        let definitions = if request.kpi_definition_ids.is_empty() {
            mirror.kpi_definitions_for(&instance.sd_type)
        } else {
            request
                .kpi_definition_ids
                .iter()
                .filter_map(|id| mirror.kpi_definition(id).cloned())
                .collect()
        };

        let values = self
            .cache
            .read()
            .expect("cache lock poisoned")
            .values_for(&request.sd_instance_uid);

        definitions
            .iter()
            .map(|definition| {
                let fulfilled = evaluate(&definition.root, &values);
                debug!(
                    kpi = %definition.id,
                    uid = %request.sd_instance_uid,
                    fulfilled,
                    "evaluated KPI"
                );
                KpiFulfillmentCheckResult {
                    kpi_definition_id: definition.id,
                    sd_instance_uid: request.sd_instance_uid.clone(),
                    fulfilled,
                }
            })
            .collect()
    }

    /// Number of instances with cached snapshots (diagnostics).
    pub fn cached_instances(&self) -> usize {
        self.cache
            .read()
            .expect("cache lock poisoned")
            .instance_count()
    }
}

impl Default for EvaluationService {
    fn default() -> Self {
        Self::new()
    }
}
