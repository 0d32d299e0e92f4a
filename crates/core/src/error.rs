use thiserror::Error;

/// Shared error type for the vigil domain crates.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("duplicate parameter \"{parameter}\" on SD type \"{sd_type}\"")]
    DuplicateParameter { sd_type: String, parameter: String },

    #[error("SD type not found: {0}")]
    SdTypeNotFound(String),

    #[error("SD instance not found: {0}")]
    SdInstanceNotFound(String),

    #[error("KPI definition not found: {0}")]
    KpiDefinitionNotFound(String),

    #[error("{0}")]
    Other(String),
}
