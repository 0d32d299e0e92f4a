//! Typed message payloads.
//!
//! These are the inner payloads carried by [`Message`](crate::Message)
//! envelopes — broadcast state updates, queue requests, and results.

use serde::{Deserialize, Serialize};

use vigil_core::kpi::{KpiDefinition, KpiDefinitionId};
use vigil_core::sd::{SdInstance, SdType};
use vigil_core::snapshot::SdParameterSnapshot;

// ── Broadcast payloads ──────────────────────────────────────────────

/// Full current set of SD types, stamped with the directory sequence.
///
/// Mirrors replace their type map when `seq` is newer than the last applied
/// stamp for this category; anything else is a stale replay and is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdTypesUpdate {
    pub seq: u64,
    pub sd_types: Vec<SdType>,
}

/// Full current set of SD instances, stamped with the directory sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdInstancesUpdate {
    pub seq: u64,
    pub sd_instances: Vec<SdInstance>,
}

/// Current KPI definitions targeting one SD type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinitionsUpdate {
    pub seq: u64,
    /// Denotation of the SD type these definitions apply to.
    pub sd_type_specification: String,
    pub kpi_definitions: Vec<KpiDefinition>,
}

// ── Queue payloads ──────────────────────────────────────────────────

/// "Please register this SD instance" — sent by the ingestion side when an
/// unknown UID shows up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdInstanceRegistrationRequest {
    /// Stable external identifier of the announcing device.
    pub uid: String,
    /// Denotation of the SD type the device claims to be.
    pub sd_type_specification: String,
}

/// Ask an evaluator to check the KPIs of one instance against the given
/// snapshot set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiFulfillmentCheckRequest {
    pub sd_instance_uid: String,
    /// Definitions to check. Empty means every mirrored definition
    /// targeting the instance's type.
    #[serde(default)]
    pub kpi_definition_ids: Vec<KpiDefinitionId>,
    /// Current parameter snapshots for the instance.
    pub snapshots: Vec<SdParameterSnapshot>,
}

/// Outcome of one (definition, instance) fulfillment check.
///
/// Overwrites the previous result for the same pair — not an append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiFulfillmentCheckResult {
    pub kpi_definition_id: KpiDefinitionId,
    pub sd_instance_uid: String,
    pub fulfilled: bool,
}

// ── Worker health ───────────────────────────────────────────────────

/// Worker health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Periodic heartbeat reporting worker health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHealth {
    /// Unique identifier for the worker.
    pub worker_id: String,
    /// Current health status.
    pub status: WorkerStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use vigil_core::kpi::{AtomNode, Node};
    use vigil_core::sd::{SdParameter, SdParameterType};

    fn roundtrip<T>(val: &T) -> T
    where
        T: Serialize + for<'de> Deserialize<'de> + std::fmt::Debug + PartialEq,
    {
        let json = serde_json::to_vec(val).expect("serialize");
        serde_json::from_slice(&json).expect("deserialize")
    }

    #[test]
    fn roundtrip_sd_types_update() {
        let msg = SdTypesUpdate {
            seq: 7,
            sd_types: vec![SdType::new(
                "weather-station",
                vec![SdParameter::new("t", SdParameterType::Number)],
            )
            .unwrap()],
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn roundtrip_sd_instances_update() {
        let msg = SdInstancesUpdate {
            seq: 12,
            sd_instances: vec![SdInstance::unconfirmed("ws-0042", "weather-station")],
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn roundtrip_kpi_definitions_update() {
        let ty = SdType::new(
            "weather-station",
            vec![SdParameter::new("t", SdParameterType::Number)],
        )
        .unwrap();
        let def = KpiDefinition::new(
            &ty,
            "temperature floor",
            Node::Atom(AtomNode::NumericGeq {
                parameter: "t".into(),
                reference: 5.0,
            }),
        )
        .unwrap();

        let msg = KpiDefinitionsUpdate {
            seq: 3,
            sd_type_specification: "weather-station".into(),
            kpi_definitions: vec![def],
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn roundtrip_registration_request() {
        let msg = SdInstanceRegistrationRequest {
            uid: "ws-0042".into(),
            sd_type_specification: "weather-station".into(),
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn roundtrip_fulfillment_result() {
        let msg = KpiFulfillmentCheckResult {
            kpi_definition_id: Uuid::new_v4(),
            sd_instance_uid: "ws-0042".into(),
            fulfilled: true,
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn check_request_definition_ids_default_empty() {
        // Requests from peers that leave the field out mean "check everything".
        let raw = serde_json::json!({
            "sd_instance_uid": "ws-0042",
            "snapshots": [],
        });
        let parsed: KpiFulfillmentCheckRequest = serde_json::from_value(raw).unwrap();
        assert!(parsed.kpi_definition_ids.is_empty());
    }

    #[test]
    fn roundtrip_worker_health() {
        let msg = WorkerHealth {
            worker_id: "evaluator-01".into(),
            status: WorkerStatus::Healthy,
        };
        assert_eq!(roundtrip(&msg), msg);
    }
}
