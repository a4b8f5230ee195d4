use thiserror::Error;

use crate::storage::DatabaseError;

/// Why an upload was refused by the quota check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("You've reached the maximum of {limit} uploaded files")]
    LifetimeLimit { limit: u64 },
    #[error("You've reached the maximum of {limit} converted files this month")]
    MonthlyLimit { limit: u64 },
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Invalid GLB: {0}")]
    InvalidGlb(String),
    #[error("Invalid glTF: {0}")]
    InvalidGltf(String),
    #[error("Missing resource '{0}'")]
    MissingResource(String),
    #[error("Resource '{0}' resolves outside the scene folder")]
    ResourceOutsideScene(String),
    #[error("Could not find a .gltf scene in the archive")]
    NoSceneDescriptor,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Malformed archive: {0}")]
    Malformed(#[from] zip::result::ZipError),
    #[error("Archive expands to {size} bytes, more than the {limit} allowed")]
    TooLarge { size: u64, limit: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the upload pipeline can fail with.
///
/// `Validation`, `Quota`, `Conversion` and `Extraction` stem from the request
/// or the uploaded content; `Storage` and `Database` are server faults.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Conversion(ConversionError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("{0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl PipelineError {
    /// True when the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PipelineError::Storage(_)
                | PipelineError::Database(_)
                | PipelineError::Extraction(ExtractionError::Io(_))
        )
    }
}

impl From<ConversionError> for PipelineError {
    fn from(e: ConversionError) -> Self {
        match e {
            // Reading the upload or writing the artifact is our problem, not the asset's
            ConversionError::Io(io) => PipelineError::Storage(io),
            other => PipelineError::Conversion(other),
        }
    }
}
