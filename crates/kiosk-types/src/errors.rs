use thiserror::Error;

pub type Result<T, E = KioskError> = std::result::Result<T, E>;

/// Unified error type covering the failure modes of every kiosk flow.
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("video sink has no frame yet")]
    EmptySink,
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("backend rejected request: {0}")]
    BackendRejected(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("invalid data uri: {0}")]
    InvalidDataUri(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("control busy: {0}")]
    ControlBusy(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
