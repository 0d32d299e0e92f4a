//! KPI rule tree evaluation.
//!
//! Evaluates AND/OR/NOR expression trees where leaf atoms check a single
//! parameter value. Evaluation is pure: no side effects, no shared state,
//! safe to call concurrently from any number of workers.
//!
//! An atom whose parameter has no snapshot evaluates to **not fulfilled**.
//! A KPI cannot be asserted true without evidence, so missing data fails
//! closed rather than raising an error. (A three-valued outcome was
//! considered; the boolean policy is kept and concentrated here.)

use vigil_core::kpi::{AtomNode, LogicalOperator, Node};
use vigil_core::snapshot::SnapshotMap;

/// Evaluate a rule tree against the current parameter values.
///
/// Children are evaluated left to right as declared; AND and OR
/// short-circuit. Given identical inputs the result is identical — repeated
/// calls are safe to cache.
pub fn evaluate(node: &Node, snapshots: &SnapshotMap) -> bool {
    match node {
        Node::Logical { operator, children } => match operator {
            LogicalOperator::And => children.iter().all(|c| evaluate(c, snapshots)),
            LogicalOperator::Or => children.iter().any(|c| evaluate(c, snapshots)),
            LogicalOperator::Nor => !children.iter().any(|c| evaluate(c, snapshots)),
        },
        Node::Atom(atom) => evaluate_atom(atom, snapshots),
    }
}

/// Evaluate a single atom. Missing or type-mismatched values are not
/// fulfilled.
fn evaluate_atom(atom: &AtomNode, snapshots: &SnapshotMap) -> bool {
    let Some(value) = snapshots.get(atom.parameter()) else {
        return false;
    };

    match atom {
        AtomNode::NumericInRange { low, high, .. } => value
            .as_number()
            .map(|v| v >= *low && v <= *high)
            .unwrap_or(false),
        AtomNode::NumericGeq { reference, .. } => value
            .as_number()
            .map(|v| v >= *reference)
            .unwrap_or(false),
        AtomNode::NumericLeq { reference, .. } => value
            .as_number()
            .map(|v| v <= *reference)
            .unwrap_or(false),
        AtomNode::StringEquals { reference, .. } => value
            .as_str()
            .map(|v| v == reference)
            .unwrap_or(false),
        AtomNode::BooleanEquals { reference, .. } => value
            .as_bool()
            .map(|v| v == *reference)
            .unwrap_or(false),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
