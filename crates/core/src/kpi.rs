//! KPI rule tree model.
//!
//! A KPI definition is a tree of logical nodes (AND/OR/NOR) over atomic
//! checks bound to device parameters. Trees are immutable values; anything
//! structurally invalid is rejected at construction time so the evaluator
//! never has to handle malformed input.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::sd::{SdParameterType, SdType};

pub type KpiDefinitionId = Uuid;

/// Logical operators for combining child nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
    /// Fulfilled iff no child is fulfilled. With a single child this is
    /// plain negation, the documented use for one-child NOR nodes.
    Nor,
}

/// An atomic check bound to one parameter denotation.
///
/// Numeric comparisons are inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtomNode {
    NumericInRange {
        parameter: String,
        low: f64,
        high: f64,
    },
    NumericGeq {
        parameter: String,
        reference: f64,
    },
    NumericLeq {
        parameter: String,
        reference: f64,
    },
    StringEquals {
        parameter: String,
        reference: String,
    },
    BooleanEquals {
        parameter: String,
        reference: bool,
    },
}

impl AtomNode {
    /// Denotation of the parameter this atom checks.
    pub fn parameter(&self) -> &str {
        match self {
            AtomNode::NumericInRange { parameter, .. }
            | AtomNode::NumericGeq { parameter, .. }
            | AtomNode::NumericLeq { parameter, .. }
            | AtomNode::StringEquals { parameter, .. }
            | AtomNode::BooleanEquals { parameter, .. } => parameter,
        }
    }

    /// Parameter type this atom kind is compatible with.
    pub fn expected_type(&self) -> SdParameterType {
        match self {
            AtomNode::NumericInRange { .. }
            | AtomNode::NumericGeq { .. }
            | AtomNode::NumericLeq { .. } => SdParameterType::Number,
            AtomNode::StringEquals { .. } => SdParameterType::String,
            AtomNode::BooleanEquals { .. } => SdParameterType::Boolean,
        }
    }
}

/// A node of the KPI rule tree: either a logical combinator or an atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Logical {
        operator: LogicalOperator,
        children: Vec<Node>,
    },
    Atom(AtomNode),
}

impl Node {
    /// Validate this subtree against the parameters declared on `sd_type`.
    ///
    /// Rejects logical nodes without children, atoms referencing unknown
    /// parameters, and atoms whose kind mismatches the declared parameter
    /// type. Valid trees need no further checks at evaluation time.
    pub fn validate(&self, sd_type: &SdType) -> Result<(), ValidationError> {
        match self {
            Node::Logical { children, .. } => {
                if children.is_empty() {
                    return Err(ValidationError::EmptyLogicalNode);
                }
                for child in children {
                    child.validate(sd_type)?;
                }
                Ok(())
            }
            Node::Atom(atom) => {
                let parameter = sd_type.parameter(atom.parameter()).ok_or_else(|| {
                    ValidationError::UnknownParameter {
                        parameter: atom.parameter().to_string(),
                        sd_type: sd_type.denotation.clone(),
                    }
                })?;
                let expected = atom.expected_type();
                if parameter.parameter_type != expected {
                    return Err(ValidationError::TypeMismatch {
                        parameter: atom.parameter().to_string(),
                        expected,
                        actual: parameter.parameter_type,
                    });
                }
                Ok(())
            }
        }
    }
}

/// A user-defined KPI: a named rule tree targeting one SD type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    pub id: KpiDefinitionId,
    /// Denotation of the SD type the KPI applies to.
    pub sd_type_specification: String,
    pub user_description: String,
    pub root: Node,
}

impl KpiDefinition {
    /// Build a definition, validating the rule tree against its target type.
    pub fn new(
        target: &SdType,
        user_description: impl Into<String>,
        root: Node,
    ) -> Result<Self, ValidationError> {
        root.validate(target)?;
        Ok(Self {
            id: Uuid::new_v4(),
            sd_type_specification: target.denotation.clone(),
            user_description: user_description.into(),
            root,
        })
    }
}

/// Rejected rule tree shapes. Returned synchronously at construction time;
/// never reaches the evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("logical node must have at least one child")]
    EmptyLogicalNode,

    #[error("parameter \"{parameter}\" does not exist on SD type \"{sd_type}\"")]
    UnknownParameter { parameter: String, sd_type: String },

    #[error("atom expects a {expected} parameter but \"{parameter}\" is {actual}")]
    TypeMismatch {
        parameter: String,
        expected: SdParameterType,
        actual: SdParameterType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sd::SdParameter;

    fn weather_station() -> SdType {
        SdType::new(
            "weather-station",
            vec![
                SdParameter::new("t", SdParameterType::Number),
                SdParameter::new("src", SdParameterType::String),
                SdParameter::new("eco_mode", SdParameterType::Boolean),
            ],
        )
        .unwrap()
    }

    #[test]
    fn valid_tree_constructs() {
        let root = Node::Logical {
            operator: LogicalOperator::And,
            children: vec![
                Node::Atom(AtomNode::NumericInRange {
                    parameter: "t".into(),
                    low: 20.0,
                    high: 24.0,
                }),
                Node::Atom(AtomNode::StringEquals {
                    parameter: "src".into(),
                    reference: "WS_in".into(),
                }),
            ],
        };

        let def = KpiDefinition::new(&weather_station(), "indoor comfort", root).unwrap();
        assert_eq!(def.sd_type_specification, "weather-station");
    }

    #[test]
    fn empty_logical_node_rejected() {
        let root = Node::Logical {
            operator: LogicalOperator::Or,
            children: vec![],
        };
        assert_eq!(
            root.validate(&weather_station()),
            Err(ValidationError::EmptyLogicalNode)
        );
    }

    #[test]
    fn unknown_parameter_rejected() {
        let root = Node::Atom(AtomNode::NumericGeq {
            parameter: "humidity".into(),
            reference: 40.0,
        });
        assert!(matches!(
            root.validate(&weather_station()),
            Err(ValidationError::UnknownParameter { parameter, .. }) if parameter == "humidity"
        ));
    }

    #[test]
    fn type_mismatch_rejected() {
        // StringEquals bound to the numeric parameter "t".
        let root = Node::Atom(AtomNode::StringEquals {
            parameter: "t".into(),
            reference: "22".into(),
        });
        assert!(matches!(
            root.validate(&weather_station()),
            Err(ValidationError::TypeMismatch {
                expected: SdParameterType::String,
                actual: SdParameterType::Number,
                ..
            })
        ));
    }

    #[test]
    fn nested_invalid_child_rejected() {
        let root = Node::Logical {
            operator: LogicalOperator::Nor,
            children: vec![Node::Logical {
                operator: LogicalOperator::And,
                children: vec![],
            }],
        };
        assert_eq!(
            root.validate(&weather_station()),
            Err(ValidationError::EmptyLogicalNode)
        );
    }

    #[test]
    fn node_serde_roundtrip() {
        let root = Node::Logical {
            operator: LogicalOperator::Nor,
            children: vec![Node::Atom(AtomNode::BooleanEquals {
                parameter: "eco_mode".into(),
                reference: true,
            })],
        };
        let json = serde_json::to_string(&root).unwrap();
        let parsed: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn atom_serde_is_kind_tagged() {
        let atom = AtomNode::NumericLeq {
            parameter: "t".into(),
            reference: 24.0,
        };
        let json = serde_json::to_value(&atom).unwrap();
        assert_eq!(json["kind"], "numeric_leq");
        assert_eq!(json["parameter"], "t");
    }
}
