//! The directory service: authoritative owner of the state directory.
//!
//! Every mutation is applied atomically under the directory lock, then the
//! resulting category set is broadcast on the fanout so mirrors converge.
//! There is no transaction spanning mutation and broadcast; the sequence
//! stamp on each delta resolves the window in between.

use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use vigil_core::error::VigilError;
use vigil_core::kpi::{KpiDefinition, Node, ValidationError};
use vigil_core::sd::{SdInstance, SdType};
use vigil_core::snapshot::SdParameterSnapshot;

use vigil_funkwerk::bridge::{EventBridge, EventCategory};
use vigil_funkwerk::events::{
    KpiDefinitionsUpdate, KpiFulfillmentCheckRequest, KpiFulfillmentCheckResult,
    SdInstanceRegistrationRequest, SdInstancesUpdate, SdTypesUpdate,
};
use vigil_funkwerk::topics;
use vigil_funkwerk::traits::{EventPublisher, QueueSender};
use vigil_funkwerk::{FunkwerkError, Message};

use crate::storage::EntityStore;
use crate::store::{Directory, DirectoryDelta, Registration};

/// Errors surfaced by directory service operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] FunkwerkError),

    #[error("SD type not found: {0}")]
    UnknownSdType(String),

    #[error("SD instance not found: {0}")]
    UnknownInstance(String),

    #[error(transparent)]
    Core(#[from] VigilError),
}

pub struct DirectoryService {
    directory: RwLock<Directory>,
    publisher: Arc<dyn EventPublisher>,
    bridge: Arc<EventBridge>,
    store: Option<Arc<dyn EntityStore>>,
}

impl DirectoryService {
    pub fn new(publisher: Arc<dyn EventPublisher>, bridge: Arc<EventBridge>) -> Self {
        Self {
            directory: RwLock::new(Directory::new()),
            publisher,
            bridge,
            store: None,
        }
    }

    /// Attach a durable store; entities are loaded from it at startup and
    /// written back on mutation.
    pub fn with_store(mut self, store: Arc<dyn EntityStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Seed the directory from the durable store, if one is attached.
    pub async fn load_from_store(&self) -> Result<(), DirectoryError> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let sd_types = store.load_sd_types().await?;
        let sd_instances = store.load_sd_instances().await?;
        let kpi_definitions = store.load_kpi_definitions().await?;

        let mut dir = self.directory.write().expect("directory lock poisoned");
        for sd_type in sd_types {
            dir.upsert_sd_type(sd_type);
        }
        for instance in sd_instances {
            dir.upsert_sd_instance(instance);
        }
        for definition in kpi_definitions {
            dir.upsert_kpi_definition(definition);
        }
        info!(seq = dir.seq(), "directory seeded from store");
        Ok(())
    }

    // ── Broadcasts ──────────────────────────────────────────────────

    /// Publish the full current state, one message per category.
    ///
    /// Called once at startup so freshly connected mirrors can serve, and
    /// usable any time a full resync is wanted.
    pub async fn broadcast_full_state(&self) -> Result<(), FunkwerkError> {
        let deltas = {
            let dir = self.directory.read().expect("directory lock poisoned");
            dir.snapshot_all()
        };
        for delta in deltas {
            self.publish_delta(delta).await?;
        }
        Ok(())
    }

    async fn publish_delta(&self, delta: DirectoryDelta) -> Result<(), FunkwerkError> {
        let message = match &delta {
            DirectoryDelta::SdTypes(update) => Message::new(topics::SD_TYPES_UPDATES, update)?,
            DirectoryDelta::SdInstances(update) => {
                Message::new(topics::SD_INSTANCES_UPDATES, update)?
            }
            DirectoryDelta::KpiDefinitions(update) => {
                Message::new(topics::KPI_DEFINITIONS_UPDATES, update)?
            }
        };
        self.publisher.publish(message).await
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Handle a registration request from the queue.
    ///
    /// An unknown UID yields exactly one new unconfirmed instance and
    /// exactly one instance-set broadcast; a known UID changes nothing and
    /// broadcasts nothing.
    pub async fn handle_registration(
        &self,
        request: &SdInstanceRegistrationRequest,
    ) -> Result<Registration, DirectoryError> {
        let (registration, update) = {
            let mut dir = self.directory.write().expect("directory lock poisoned");
            let (registration, seq) = dir.register_instance(
                request.uid.as_str(),
                request.sd_type_specification.as_str(),
            );
            let update = seq.map(|seq| SdInstancesUpdate {
                seq,
                sd_instances: dir.sd_instances(),
            });
            (registration, update)
        };

        if let Registration::Created(instance) = &registration {
            info!(uid = %instance.uid, sd_type = %instance.sd_type, "registered new SD instance");
            if let Some(store) = &self.store {
                store.save_sd_instance(instance).await?;
            }
            let event = Message::new(EventCategory::InstanceRegistered.to_string(), instance)
                .map_err(FunkwerkError::Serialization)?;
            self.bridge.dispatch(EventCategory::InstanceRegistered, event);
        }
        if let Some(update) = update {
            self.publish_delta(DirectoryDelta::SdInstances(update)).await?;
        }
        Ok(registration)
    }

    /// Administrator action: confirm a registered instance.
    pub async fn confirm_instance(&self, uid: &str) -> Result<SdInstance, DirectoryError> {
        let (instance, update) = {
            let mut dir = self.directory.write().expect("directory lock poisoned");
            let (instance, seq) = dir
                .confirm_instance(uid)
                .ok_or_else(|| DirectoryError::UnknownInstance(uid.to_string()))?;
            let update = SdInstancesUpdate {
                seq,
                sd_instances: dir.sd_instances(),
            };
            (instance, update)
        };

        if let Some(store) = &self.store {
            store.save_sd_instance(&instance).await?;
        }
        self.publish_delta(DirectoryDelta::SdInstances(update)).await?;
        Ok(instance)
    }

    /// Administrator action: create or replace an SD type.
    pub async fn create_sd_type(&self, sd_type: SdType) -> Result<(), DirectoryError> {
        let update = {
            let mut dir = self.directory.write().expect("directory lock poisoned");
            let seq = dir.upsert_sd_type(sd_type.clone());
            SdTypesUpdate {
                seq,
                sd_types: dir.sd_types(),
            }
        };

        if let Some(store) = &self.store {
            store.save_sd_type(&sd_type).await?;
        }
        self.publish_delta(DirectoryDelta::SdTypes(update)).await?;
        Ok(())
    }

    /// Administrator action: create a KPI definition.
    ///
    /// The rule tree is validated against the target type before anything
    /// is stored or broadcast.
    pub async fn create_kpi_definition(
        &self,
        sd_type_denotation: &str,
        description: &str,
        root: Node,
    ) -> Result<KpiDefinition, DirectoryError> {
        let (definition, update) = {
            let mut dir = self.directory.write().expect("directory lock poisoned");
            let target = dir
                .sd_type_by_denotation(sd_type_denotation)
                .ok_or_else(|| DirectoryError::UnknownSdType(sd_type_denotation.to_string()))?;
            let definition = KpiDefinition::new(target, description, root)?;
            let seq = dir.upsert_kpi_definition(definition.clone());
            let update = KpiDefinitionsUpdate {
                seq,
                sd_type_specification: sd_type_denotation.to_string(),
                kpi_definitions: dir.kpi_definitions_for(sd_type_denotation),
            };
            (definition, update)
        };

        if let Some(store) = &self.store {
            store.save_kpi_definition(&definition).await?;
        }
        self.publish_delta(DirectoryDelta::KpiDefinitions(update)).await?;
        Ok(definition)
    }

    /// Record a fulfillment result coming back from an evaluator.
    ///
    /// Overwrites the previous result for the same (definition, instance)
    /// pair and feeds the API subscription bridge.
    pub fn record_result(&self, result: &KpiFulfillmentCheckResult) {
        {
            let mut dir = self.directory.write().expect("directory lock poisoned");
            dir.record_result(result);
        }
        match Message::new(EventCategory::FulfillmentUpdated.to_string(), result) {
            Ok(message) => self.bridge.dispatch(EventCategory::FulfillmentUpdated, message),
            Err(e) => warn!(error = %e, "failed to serialize fulfillment bridge event"),
        }
    }

    /// Fan a fulfillment check out to the evaluators.
    pub async fn request_check(
        &self,
        requests: &dyn QueueSender,
        sd_instance_uid: &str,
        snapshots: Vec<SdParameterSnapshot>,
    ) -> Result<(), FunkwerkError> {
        let request = KpiFulfillmentCheckRequest {
            sd_instance_uid: sd_instance_uid.to_string(),
            kpi_definition_ids: Vec::new(),
            snapshots,
        };
        let message = Message::new(topics::KPI_FULFILLMENT_CHECK_REQUESTS, &request)?;
        requests.send(message).await
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn sd_types(&self) -> Vec<SdType> {
        self.directory
            .read()
            .expect("directory lock poisoned")
            .sd_types()
    }

    pub fn sd_instances(&self) -> Vec<SdInstance> {
        self.directory
            .read()
            .expect("directory lock poisoned")
            .sd_instances()
    }

    pub fn latest_result(
        &self,
        definition: &vigil_core::kpi::KpiDefinitionId,
        uid: &str,
    ) -> Option<bool> {
        self.directory
            .read()
            .expect("directory lock poisoned")
            .latest_result(definition, uid)
    }
}
