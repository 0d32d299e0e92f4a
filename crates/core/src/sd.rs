use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VigilError;

pub type SdTypeId = Uuid;
pub type SdInstanceId = Uuid;

/// Declared type of a smart-device parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdParameterType {
    String,
    Number,
    Boolean,
}

impl std::fmt::Display for SdParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdParameterType::String => write!(f, "string"),
            SdParameterType::Number => write!(f, "number"),
            SdParameterType::Boolean => write!(f, "boolean"),
        }
    }
}

/// One parameter declared on an [`SdType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdParameter {
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Human-readable name, unique within the owning type.
    pub denotation: String,
    #[serde(rename = "type")]
    pub parameter_type: SdParameterType,
}

impl SdParameter {
    pub fn new(denotation: impl Into<String>, parameter_type: SdParameterType) -> Self {
        Self {
            id: None,
            denotation: denotation.into(),
            parameter_type,
        }
    }
}

/// A smart-device type: a named, ordered set of parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdType {
    /// Assigned when the type is first persisted; `None` before that.
    #[serde(default)]
    pub id: Option<SdTypeId>,
    pub denotation: String,
    pub parameters: Vec<SdParameter>,
}

impl SdType {
    /// Construct a type, enforcing that parameter denotations are unique.
    pub fn new(
        denotation: impl Into<String>,
        parameters: Vec<SdParameter>,
    ) -> Result<Self, VigilError> {
        let denotation = denotation.into();
        let mut seen = std::collections::HashSet::new();
        for p in &parameters {
            if !seen.insert(p.denotation.as_str()) {
                return Err(VigilError::DuplicateParameter {
                    sd_type: denotation.clone(),
                    parameter: p.denotation.clone(),
                });
            }
        }
        Ok(Self {
            id: None,
            denotation,
            parameters,
        })
    }

    /// Look up a parameter by denotation.
    pub fn parameter(&self, denotation: &str) -> Option<&SdParameter> {
        self.parameters.iter().find(|p| p.denotation == denotation)
    }
}

/// A registered smart-device instance.
///
/// Instances are created unconfirmed when they first announce themselves
/// through a registration request; an administrator confirms them later.
/// The UID is the stable external identifier and is unique system-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdInstance {
    #[serde(default)]
    pub id: Option<SdInstanceId>,
    /// Stable external identifier (e.g. the vendor serial), unique.
    pub uid: String,
    pub confirmed_by_user: bool,
    pub user_identifier: String,
    /// Denotation of the [`SdType`] this instance belongs to.
    pub sd_type: String,
}

impl SdInstance {
    /// Create a fresh, unconfirmed instance as produced by a registration request.
    pub fn unconfirmed(uid: impl Into<String>, sd_type: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            id: None,
            user_identifier: uid.clone(),
            uid,
            confirmed_by_user: false,
            sd_type: sd_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sd_type_rejects_duplicate_denotations() {
        let result = SdType::new(
            "thermostat",
            vec![
                SdParameter::new("temperature", SdParameterType::Number),
                SdParameter::new("temperature", SdParameterType::String),
            ],
        );
        assert!(matches!(
            result,
            Err(VigilError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn sd_type_parameter_lookup() {
        let ty = SdType::new(
            "thermostat",
            vec![
                SdParameter::new("temperature", SdParameterType::Number),
                SdParameter::new("eco_mode", SdParameterType::Boolean),
            ],
        )
        .unwrap();

        assert_eq!(
            ty.parameter("eco_mode").map(|p| p.parameter_type),
            Some(SdParameterType::Boolean)
        );
        assert!(ty.parameter("humidity").is_none());
    }

    #[test]
    fn unconfirmed_instance_defaults() {
        let inst = SdInstance::unconfirmed("ws-0042", "weather-station");
        assert!(!inst.confirmed_by_user);
        assert_eq!(inst.user_identifier, "ws-0042");
        assert!(inst.id.is_none());
    }

    #[test]
    fn parameter_type_serde_snake_case() {
        let json = serde_json::to_string(&SdParameterType::Boolean).unwrap();
        assert_eq!(json, "\"boolean\"");
        let parsed: SdParameterType = serde_json::from_str("\"number\"").unwrap();
        assert_eq!(parsed, SdParameterType::Number);
    }
}
