//! Fixed topic and queue names of the synchronization protocol.
//!
//! These strings are part of the wire contract between the directory
//! service and evaluator processes; they are bound into a
//! [`BusTopology`](crate::config::BusTopology) at construction rather than
//! read as ambient globals.

// ── Broadcast topics (fanout exchange) ────────────────────────────────────

/// Current set of SD types, published on every type mutation and at startup.
pub const SD_TYPES_UPDATES: &str = "set-of-sd-types-updates";

/// Current set of SD instances, published on every instance mutation and at startup.
pub const SD_INSTANCES_UPDATES: &str = "set-of-sd-instances-updates";

/// Current KPI definitions for one SD type.
pub const KPI_DEFINITIONS_UPDATES: &str = "kpi-definitions-by-type-updates";

/// Periodic worker health heartbeat.
pub const WORKER_HEALTH: &str = "vigil.worker.health";

// ── Point-to-point queues ─────────────────────────────────────────────────

/// Evaluators/ingestion announce unknown SD instances here; only the
/// directory service consumes it.
pub const SD_INSTANCE_REGISTRATION_REQUESTS: &str = "sd-instance-registration-requests";

/// Directory service fans fulfillment work out to evaluators here.
pub const KPI_FULFILLMENT_CHECK_REQUESTS: &str = "kpi-fulfillment-check-requests";

/// Evaluators push fulfillment outcomes back here.
pub const KPI_FULFILLMENT_CHECK_RESULTS: &str = "kpi-fulfillment-check-results";
