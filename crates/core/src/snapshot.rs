use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observed parameter value. Exactly one variant is populated,
/// mirroring the declared [`SdParameterType`](crate::sd::SdParameterType).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl ParameterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// The most recently observed value of one parameter on one instance.
///
/// Superseded snapshots are discarded, not retained — there is no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdParameterSnapshot {
    /// UID of the instance the observation belongs to.
    pub instance_uid: String,
    pub parameter_denotation: String,
    pub value: ParameterValue,
    pub updated_at: DateTime<Utc>,
}

/// Mapping from parameter denotation to current value, as consumed by the
/// rule evaluator.
pub type SnapshotMap = HashMap<String, ParameterValue>;

/// Latest-value-wins store of parameter snapshots, keyed by instance UID
/// and parameter denotation.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    by_instance: HashMap<String, SnapshotMap>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot, overwriting any previous value for the same
    /// (instance, parameter) pair.
    pub fn record(&mut self, snapshot: SdParameterSnapshot) {
        self.by_instance
            .entry(snapshot.instance_uid)
            .or_default()
            .insert(snapshot.parameter_denotation, snapshot.value);
    }

    /// Current values for one instance. Empty map if nothing was observed yet.
    pub fn values_for(&self, instance_uid: &str) -> SnapshotMap {
        self.by_instance
            .get(instance_uid)
            .cloned()
            .unwrap_or_default()
    }

    pub fn instance_count(&self) -> usize {
        self.by_instance.len()
    }
}
