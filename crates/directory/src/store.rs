//! The state directory: a versioned registry of SD types, SD instances and
//! KPI definitions.
//!
//! The same structure serves two roles. The directory service holds the
//! authoritative copy and mutates it through the `upsert`/`remove`/
//! `register` operations, each of which bumps the directory sequence.
//! Evaluator processes hold read-only mirrors and feed them exclusively
//! through [`Directory::apply_delta`]; deltas carry the sequence stamp, so
//! duplicate or reordered delivery collapses to a no-op.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;

use vigil_core::kpi::{KpiDefinition, KpiDefinitionId};
use vigil_core::sd::{SdInstance, SdInstanceId, SdType, SdTypeId};
use vigil_funkwerk::events::{
    KpiDefinitionsUpdate, KpiFulfillmentCheckResult, SdInstancesUpdate, SdTypesUpdate,
};

/// A versioned state update as carried on the fanout broadcast.
///
/// Each variant replaces one category of the mirror wholesale; the `seq`
/// stamp inside decides whether it applies.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryDelta {
    SdTypes(SdTypesUpdate),
    SdInstances(SdInstancesUpdate),
    KpiDefinitions(KpiDefinitionsUpdate),
}

/// Outcome of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new unconfirmed instance entered the directory.
    Created(SdInstance),
    /// The UID was already known; the existing instance is untouched.
    AlreadyKnown(SdInstance),
}

#[derive(Debug, Default)]
pub struct Directory {
    /// Monotonic mutation counter on the authoritative copy; stamps every
    /// outgoing delta.
    seq: u64,

    sd_types: IndexMap<SdTypeId, SdType>,
    sd_type_by_denotation: HashMap<String, SdTypeId>,

    sd_instances: IndexMap<SdInstanceId, SdInstance>,
    sd_instance_by_uid: HashMap<String, SdInstanceId>,

    kpi_definitions: IndexMap<KpiDefinitionId, KpiDefinition>,

    /// Latest fulfillment outcome per (definition, instance UID) pair.
    results: HashMap<(KpiDefinitionId, String), bool>,

    // Last applied delta stamps (mirror role).
    applied_types_seq: u64,
    applied_instances_seq: u64,
    applied_kpi_seq: HashMap<String, u64>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump and return the directory sequence. Every authoritative mutation
    /// calls this exactly once so broadcasts are totally ordered.
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    // ── Authoritative mutations ─────────────────────────────────────

    /// Insert or replace an SD type, keyed by denotation. Returns the
    /// sequence stamp of the mutation.
    pub fn upsert_sd_type(&mut self, mut sd_type: SdType) -> u64 {
        let id = match self.sd_type_by_denotation.get(&sd_type.denotation) {
            Some(existing) => *existing,
            None => sd_type.id.unwrap_or_else(Uuid::new_v4),
        };
        sd_type.id = Some(id);
        self.sd_type_by_denotation
            .insert(sd_type.denotation.clone(), id);
        self.sd_types.insert(id, sd_type);
        self.next_seq()
    }

    /// Remove an SD type by denotation. Returns the stamp if it existed.
    pub fn remove_sd_type(&mut self, denotation: &str) -> Option<u64> {
        let id = self.sd_type_by_denotation.remove(denotation)?;
        self.sd_types.shift_remove(&id);
        Some(self.next_seq())
    }

    /// Handle a registration request.
    ///
    /// An unknown UID creates exactly one new unconfirmed instance. A known
    /// UID resolves silently to the existing instance — duplicate
    /// registration is not a conflict, and no mutation happens.
    pub fn register_instance(
        &mut self,
        uid: impl Into<String>,
        sd_type: impl Into<String>,
    ) -> (Registration, Option<u64>) {
        let uid = uid.into();
        if let Some(existing_id) = self.sd_instance_by_uid.get(&uid) {
            let existing = self.sd_instances[existing_id].clone();
            debug!(uid = %uid, "registration for known UID, keeping existing instance");
            return (Registration::AlreadyKnown(existing), None);
        }

        let mut instance = SdInstance::unconfirmed(uid.clone(), sd_type);
        let id = Uuid::new_v4();
        instance.id = Some(id);
        self.sd_instance_by_uid.insert(uid, id);
        self.sd_instances.insert(id, instance.clone());
        let seq = self.next_seq();
        (Registration::Created(instance), Some(seq))
    }

    /// Insert or replace an instance, keyed by UID.
    pub fn upsert_sd_instance(&mut self, mut instance: SdInstance) -> u64 {
        let id = match self.sd_instance_by_uid.get(&instance.uid) {
            Some(existing) => *existing,
            None => instance.id.unwrap_or_else(Uuid::new_v4),
        };
        instance.id = Some(id);
        self.sd_instance_by_uid.insert(instance.uid.clone(), id);
        self.sd_instances.insert(id, instance);
        self.next_seq()
    }

    /// Remove an instance by UID. Returns the stamp if it existed.
    pub fn remove_sd_instance(&mut self, uid: &str) -> Option<u64> {
        let id = self.sd_instance_by_uid.remove(uid)?;
        self.sd_instances.shift_remove(&id);
        Some(self.next_seq())
    }

    /// Mark an instance as confirmed by an administrator.
    pub fn confirm_instance(&mut self, uid: &str) -> Option<(SdInstance, u64)> {
        let id = *self.sd_instance_by_uid.get(uid)?;
        let instance = self.sd_instances.get_mut(&id)?;
        instance.confirmed_by_user = true;
        let updated = instance.clone();
        let seq = self.next_seq();
        Some((updated, seq))
    }

    /// Insert or replace a KPI definition.
    pub fn upsert_kpi_definition(&mut self, definition: KpiDefinition) -> u64 {
        self.kpi_definitions.insert(definition.id, definition);
        self.next_seq()
    }

    /// Remove a KPI definition. Returns the stamp if it existed.
    pub fn remove_kpi_definition(&mut self, id: &KpiDefinitionId) -> Option<u64> {
        self.kpi_definitions.shift_remove(id)?;
        Some(self.next_seq())
    }

    /// Record a fulfillment result, superseding the previous one for the
    /// same (definition, instance) pair.
    pub fn record_result(&mut self, result: &KpiFulfillmentCheckResult) {
        self.results.insert(
            (result.kpi_definition_id, result.sd_instance_uid.clone()),
            result.fulfilled,
        );
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn sd_type_by_denotation(&self, denotation: &str) -> Option<&SdType> {
        let id = self.sd_type_by_denotation.get(denotation)?;
        self.sd_types.get(id)
    }

    pub fn sd_instance_by_uid(&self, uid: &str) -> Option<&SdInstance> {
        let id = self.sd_instance_by_uid.get(uid)?;
        self.sd_instances.get(id)
    }

    pub fn sd_types(&self) -> Vec<SdType> {
        self.sd_types.values().cloned().collect()
    }

    pub fn sd_instances(&self) -> Vec<SdInstance> {
        self.sd_instances.values().cloned().collect()
    }

    pub fn kpi_definitions_for(&self, sd_type_denotation: &str) -> Vec<KpiDefinition> {
        self.kpi_definitions
            .values()
            .filter(|d| d.sd_type_specification == sd_type_denotation)
            .cloned()
            .collect()
    }

    pub fn kpi_definition(&self, id: &KpiDefinitionId) -> Option<&KpiDefinition> {
        self.kpi_definitions.get(id)
    }

    /// SD type denotations that currently have KPI definitions.
    pub fn kpi_target_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .kpi_definitions
            .values()
            .map(|d| d.sd_type_specification.clone())
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    pub fn latest_result(&self, definition: &KpiDefinitionId, uid: &str) -> Option<bool> {
        self.results
            .get(&(*definition, uid.to_string()))
            .copied()
    }

    // ── Replication ─────────────────────────────────────────────────

    /// Build the full-state deltas published at process start and consumed
    /// by freshly connected mirrors.
    pub fn snapshot_all(&self) -> Vec<DirectoryDelta> {
        let mut deltas = vec![
            DirectoryDelta::SdTypes(SdTypesUpdate {
                seq: self.seq,
                sd_types: self.sd_types(),
            }),
            DirectoryDelta::SdInstances(SdInstancesUpdate {
                seq: self.seq,
                sd_instances: self.sd_instances(),
            }),
        ];
        for sd_type in self.kpi_target_types() {
            deltas.push(DirectoryDelta::KpiDefinitions(KpiDefinitionsUpdate {
                seq: self.seq,
                kpi_definitions: self.kpi_definitions_for(&sd_type),
                sd_type_specification: sd_type,
            }));
        }
        deltas
    }

    /// Apply an incoming broadcast delta to this mirror.
    ///
    /// Returns `true` if the delta was applied, `false` if it was stale
    /// (its stamp is not newer than the last applied one for its category).
    /// Applying the same delta twice therefore leaves the mirror unchanged.
    pub fn apply_delta(&mut self, delta: &DirectoryDelta) -> bool {
        match delta {
            DirectoryDelta::SdTypes(update) => {
                if update.seq <= self.applied_types_seq {
                    debug!(seq = update.seq, applied = self.applied_types_seq, "stale type delta dropped");
                    return false;
                }
                self.sd_types.clear();
                self.sd_type_by_denotation.clear();
                for sd_type in &update.sd_types {
                    let id = sd_type.id.unwrap_or_else(Uuid::new_v4);
                    self.sd_type_by_denotation
                        .insert(sd_type.denotation.clone(), id);
                    let mut sd_type = sd_type.clone();
                    sd_type.id = Some(id);
                    self.sd_types.insert(id, sd_type);
                }
                self.applied_types_seq = update.seq;
                true
            }
            DirectoryDelta::SdInstances(update) => {
                if update.seq <= self.applied_instances_seq {
                    debug!(seq = update.seq, applied = self.applied_instances_seq, "stale instance delta dropped");
                    return false;
                }
                self.sd_instances.clear();
                self.sd_instance_by_uid.clear();
                for instance in &update.sd_instances {
                    let id = instance.id.unwrap_or_else(Uuid::new_v4);
                    self.sd_instance_by_uid.insert(instance.uid.clone(), id);
                    let mut instance = instance.clone();
                    instance.id = Some(id);
                    self.sd_instances.insert(id, instance);
                }
                self.applied_instances_seq = update.seq;
                true
            }
            DirectoryDelta::KpiDefinitions(update) => {
                let applied = self
                    .applied_kpi_seq
                    .get(&update.sd_type_specification)
                    .copied()
                    .unwrap_or(0);
                if update.seq <= applied {
                    debug!(seq = update.seq, applied, "stale KPI delta dropped");
                    return false;
                }
                // Replace this type's definitions, leave other types alone.
                self.kpi_definitions
                    .retain(|_, d| d.sd_type_specification != update.sd_type_specification);
                for definition in &update.kpi_definitions {
                    self.kpi_definitions.insert(definition.id, definition.clone());
                }
                self.applied_kpi_seq
                    .insert(update.sd_type_specification.clone(), update.seq);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::kpi::{AtomNode, Node};
    use vigil_core::sd::{SdParameter, SdParameterType};

    fn weather_station() -> SdType {
        SdType::new(
            "weather-station",
            vec![SdParameter::new("t", SdParameterType::Number)],
        )
        .unwrap()
    }

    fn temp_floor_kpi(ty: &SdType) -> KpiDefinition {
        KpiDefinition::new(
            ty,
            "temperature floor",
            Node::Atom(AtomNode::NumericGeq {
                parameter: "t".into(),
                reference: 5.0,
            }),
        )
        .unwrap()
    }

    #[test]
    fn registration_creates_one_unconfirmed_instance() {
        let mut dir = Directory::new();
        let (outcome, seq) = dir.register_instance("ws-0042", "weather-station");

        match outcome {
            Registration::Created(inst) => {
                assert!(!inst.confirmed_by_user);
                assert_eq!(inst.uid, "ws-0042");
            }
            other => panic!("expected Created, got {other:?}"),
        }
        assert!(seq.is_some());
        assert_eq!(dir.sd_instances().len(), 1);
    }

    #[test]
    fn duplicate_uid_resolves_to_existing_instance() {
        let mut dir = Directory::new();
        dir.register_instance("ws-0042", "weather-station");
        let seq_before = dir.seq();

        let (outcome, seq) = dir.register_instance("ws-0042", "weather-station");
        assert!(matches!(outcome, Registration::AlreadyKnown(_)));
        assert_eq!(seq, None, "no mutation for a known UID");
        assert_eq!(dir.seq(), seq_before);
        assert_eq!(dir.sd_instances().len(), 1);
    }

    #[test]
    fn confirm_instance_flips_flag_and_bumps_seq() {
        let mut dir = Directory::new();
        dir.register_instance("ws-0042", "weather-station");

        let (instance, seq) = dir.confirm_instance("ws-0042").unwrap();
        assert!(instance.confirmed_by_user);
        assert_eq!(seq, dir.seq());
        assert!(dir.sd_instance_by_uid("ws-0042").unwrap().confirmed_by_user);
    }

    #[test]
    fn upsert_sd_type_keyed_by_denotation() {
        let mut dir = Directory::new();
        dir.upsert_sd_type(weather_station());

        // Re-upserting the same denotation replaces, not duplicates.
        let replacement = SdType::new(
            "weather-station",
            vec![
                SdParameter::new("t", SdParameterType::Number),
                SdParameter::new("humidity", SdParameterType::Number),
            ],
        )
        .unwrap();
        dir.upsert_sd_type(replacement);

        assert_eq!(dir.sd_types().len(), 1);
        assert_eq!(
            dir.sd_type_by_denotation("weather-station")
                .unwrap()
                .parameters
                .len(),
            2
        );
    }

    #[test]
    fn delta_idempotence() {
        let mut authoritative = Directory::new();
        authoritative.register_instance("ws-0042", "weather-station");
        let update = SdInstancesUpdate {
            seq: authoritative.seq(),
            sd_instances: authoritative.sd_instances(),
        };
        let delta = DirectoryDelta::SdInstances(update);

        let mut mirror = Directory::new();
        assert!(mirror.apply_delta(&delta));
        let after_first = mirror.sd_instances();

        // Duplicate delivery is a no-op.
        assert!(!mirror.apply_delta(&delta));
        assert_eq!(mirror.sd_instances(), after_first);
    }

    #[test]
    fn stale_delta_is_dropped() {
        let mut mirror = Directory::new();

        let newer = DirectoryDelta::SdInstances(SdInstancesUpdate {
            seq: 5,
            sd_instances: vec![SdInstance::unconfirmed("ws-0042", "weather-station")],
        });
        let older = DirectoryDelta::SdInstances(SdInstancesUpdate {
            seq: 3,
            sd_instances: vec![],
        });

        assert!(mirror.apply_delta(&newer));
        assert!(!mirror.apply_delta(&older), "older delta must not apply");
        assert_eq!(mirror.sd_instances().len(), 1);
    }

    #[test]
    fn kpi_delta_replaces_only_its_type() {
        let ws = weather_station();
        let hp = SdType::new(
            "heat-pump",
            vec![SdParameter::new("t", SdParameterType::Number)],
        )
        .unwrap();

        let ws_def = temp_floor_kpi(&ws);
        let hp_def = temp_floor_kpi(&hp);

        let mut mirror = Directory::new();
        mirror.apply_delta(&DirectoryDelta::KpiDefinitions(KpiDefinitionsUpdate {
            seq: 1,
            sd_type_specification: "weather-station".into(),
            kpi_definitions: vec![ws_def.clone()],
        }));
        mirror.apply_delta(&DirectoryDelta::KpiDefinitions(KpiDefinitionsUpdate {
            seq: 2,
            sd_type_specification: "heat-pump".into(),
            kpi_definitions: vec![hp_def],
        }));

        // Empty update for weather-station clears only that type.
        mirror.apply_delta(&DirectoryDelta::KpiDefinitions(KpiDefinitionsUpdate {
            seq: 3,
            sd_type_specification: "weather-station".into(),
            kpi_definitions: vec![],
        }));

        assert!(mirror.kpi_definitions_for("weather-station").is_empty());
        assert_eq!(mirror.kpi_definitions_for("heat-pump").len(), 1);
    }

    #[test]
    fn snapshot_all_covers_every_category() {
        let mut dir = Directory::new();
        let ws = weather_station();
        dir.upsert_sd_type(ws.clone());
        dir.register_instance("ws-0042", "weather-station");
        dir.upsert_kpi_definition(temp_floor_kpi(&ws));

        let deltas = dir.snapshot_all();
        assert_eq!(deltas.len(), 3);
        assert!(matches!(deltas[0], DirectoryDelta::SdTypes(_)));
        assert!(matches!(deltas[1], DirectoryDelta::SdInstances(_)));
        assert!(matches!(deltas[2], DirectoryDelta::KpiDefinitions(_)));

        // A fresh mirror fed the snapshot converges to the same state.
        let mut mirror = Directory::new();
        for delta in &deltas {
            assert!(mirror.apply_delta(delta));
        }
        assert_eq!(mirror.sd_types().len(), 1);
        assert_eq!(mirror.sd_instances().len(), 1);
        assert_eq!(mirror.kpi_definitions_for("weather-station").len(), 1);
    }

    #[test]
    fn result_overwrite_by_key() {
        let mut dir = Directory::new();
        let ws = weather_station();
        let def = temp_floor_kpi(&ws);

        dir.record_result(&KpiFulfillmentCheckResult {
            kpi_definition_id: def.id,
            sd_instance_uid: "ws-0042".into(),
            fulfilled: true,
        });
        dir.record_result(&KpiFulfillmentCheckResult {
            kpi_definition_id: def.id,
            sd_instance_uid: "ws-0042".into(),
            fulfilled: false,
        });

        assert_eq!(dir.latest_result(&def.id, "ws-0042"), Some(false));
    }

    #[test]
    fn remove_sd_instance_clears_index() {
        let mut dir = Directory::new();
        dir.register_instance("ws-0042", "weather-station");
        assert!(dir.remove_sd_instance("ws-0042").is_some());
        assert!(dir.sd_instance_by_uid("ws-0042").is_none());
        assert!(dir.remove_sd_instance("ws-0042").is_none());

        // The UID is free again: a re-registration creates a fresh instance.
        let (outcome, _) = dir.register_instance("ws-0042", "weather-station");
        assert!(matches!(outcome, Registration::Created(_)));
    }

    #[test]
    fn remove_sd_type_clears_index() {
        let mut dir = Directory::new();
        dir.upsert_sd_type(weather_station());
        assert!(dir.remove_sd_type("weather-station").is_some());
        assert!(dir.sd_type_by_denotation("weather-station").is_none());
        assert!(dir.remove_sd_type("weather-station").is_none());
    }
}
