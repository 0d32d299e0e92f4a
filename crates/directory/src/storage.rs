//! Persistence boundary.
//!
//! The directory treats durable storage as an opaque collaborator behind
//! Load/Save-shaped operations. No implementation ships with this crate;
//! the service runs purely in memory when no store is supplied.

use async_trait::async_trait;

use vigil_core::error::VigilError;
use vigil_core::kpi::KpiDefinition;
use vigil_core::sd::{SdInstance, SdType};

/// Opaque durable store for directory entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load_sd_types(&self) -> Result<Vec<SdType>, VigilError>;
    async fn load_sd_instances(&self) -> Result<Vec<SdInstance>, VigilError>;
    async fn load_kpi_definitions(&self) -> Result<Vec<KpiDefinition>, VigilError>;

    async fn save_sd_type(&self, sd_type: &SdType) -> Result<(), VigilError>;
    async fn save_sd_instance(&self, instance: &SdInstance) -> Result<(), VigilError>;
    async fn save_kpi_definition(&self, definition: &KpiDefinition) -> Result<(), VigilError>;
}
