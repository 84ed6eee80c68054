use crate::gateway::ReportId;
use crate::viewer::ViewerRole;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotationError {
    /// The one fatal condition: without base-image dimensions no layer can exist.
    #[error("base image unavailable: {reason}")]
    BaseImageUnavailable { reason: String },

    #[error("{role:?} viewers cannot edit annotations")]
    ReadOnlyRole { role: ViewerRole },

    #[error("raster decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("raster encode failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("a save for report {report} is already in flight")]
    InFlight { report: ReportId },

    #[error("persistence failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("annotation could not be encoded: {0}")]
    Encode(String),

    #[error("save worker exited without reporting a result")]
    WorkerGone,
}

impl SaveError {
    /// Whether the caller may simply try the same save again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SaveError::InFlight { .. } | SaveError::Gateway(_))
    }
}
