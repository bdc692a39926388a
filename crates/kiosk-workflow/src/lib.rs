//! Capture-and-verify workflows for the registration and attendance pages.

use async_trait::async_trait;
use kiosk_camera::{StreamOptions, VideoSink};
use kiosk_network::ImagePayload;
use kiosk_types::{
    config::{CaptureConfig, ImageTransport, KioskConfig},
    frame::CapturedFrame,
    KioskError, Result,
};
use kiosk_vision::{data_uri_to_blob, FrameEncoder};

mod attendance;
mod registration;
mod roster;
mod surface;

#[cfg(test)]
mod testing;

pub use attendance::{AttendanceController, AttendancePhase, PunchReceipt};
pub use registration::{RegistrationController, RegistrationPhase};
pub use roster::UserListEditor;
pub use surface::{show_message, ElementState, MemorySurface, SurfaceSnapshot, UiSurface};

pub(crate) const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "Could not access camera. Allow camera permission and refresh.";

/// Per-page knobs shared by both workflows.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowSettings {
    pub stream: StreamOptions,
    pub encoder: FrameEncoder,
    pub transport: ImageTransport,
}

impl WorkflowSettings {
    pub fn from_config(config: &KioskConfig) -> Self {
        Self {
            stream: StreamOptions::from(&config.camera),
            encoder: FrameEncoder::new(&config.capture),
            transport: config.backend.image_transport,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            stream: StreamOptions::default(),
            encoder: FrameEncoder::new(&CaptureConfig::default()),
            transport: ImageTransport::DataUri,
        }
    }
}

/// Lifecycle shared by every page: load starts the camera, unload releases it.
#[async_trait]
pub trait PageController: Send + Sync {
    fn page(&self) -> &'static str;
    async fn load(&self) -> Result<()>;
    async fn unload(&self);
}

/// Wraps an already captured frame in the configured wire form.
pub(crate) fn payload_for(frame: &CapturedFrame, transport: ImageTransport) -> Result<ImagePayload> {
    match transport {
        ImageTransport::DataUri => Ok(ImagePayload::DataUri(frame.data_uri.clone())),
        ImageTransport::Multipart => data_uri_to_blob(&frame.data_uri).map(ImagePayload::Blob),
    }
}

/// Snapshots the sink straight into the configured wire form.
pub(crate) fn capture_payload(
    encoder: &FrameEncoder,
    sink: &VideoSink,
    transport: ImageTransport,
) -> Result<ImagePayload> {
    match transport {
        ImageTransport::DataUri => encoder
            .capture_frame(sink)
            .map(|frame| ImagePayload::DataUri(frame.data_uri)),
        ImageTransport::Multipart => encoder
            .capture_blob(sink, encoder.format())
            .map(ImagePayload::Blob),
    }
}

pub fn workflow_error(message: impl Into<String>) -> KioskError {
    KioskError::ValidationFailed(message.into())
}
