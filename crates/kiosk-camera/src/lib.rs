//! Camera stream lifecycle: devices, tracks, the video sink, and the stream manager.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kiosk_types::{
    config::{CameraConfig, CameraSource, FacingMode},
    frame::ImageFrame,
    KioskError, Result,
};
use tracing::{info, warn};
use uuid::Uuid;

mod still;
mod synthetic;

pub use still::StillImageCamera;
pub use synthetic::SyntheticCamera;

/// Constraints for a video-only capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::User,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

impl From<&CameraConfig> for StreamOptions {
    fn from(config: &CameraConfig) -> Self {
        Self {
            facing_mode: config.facing_mode,
            ideal_width: config.width,
            ideal_height: config.height,
        }
    }
}

/// A single video track delivered by a device.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;
    fn stop(&self);
    fn is_live(&self) -> bool;
    /// Most recently decoded frame, `None` until the track delivers one.
    fn latest_frame(&self) -> Option<ImageFrame>;
}

/// An opened capture stream and its tracks.
#[derive(Clone)]
pub struct MediaStream {
    pub id: Uuid,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks,
        }
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|track| track.is_live())
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// On-screen video element: displays whichever stream is attached as its source.
#[derive(Clone, Default)]
pub struct VideoSink {
    source: Arc<Mutex<Option<MediaStream>>>,
}

impl VideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_source(&self, stream: Option<MediaStream>) {
        if let Ok(mut guard) = self.source.lock() {
            *guard = stream;
        }
    }

    pub fn has_source(&self) -> bool {
        self.source.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Frame currently being decoded from the first live track.
    pub fn current_frame(&self) -> Option<ImageFrame> {
        let guard = self.source.lock().ok()?;
        let stream = guard.as_ref()?;
        stream
            .tracks()
            .iter()
            .filter(|track| track.is_live())
            .find_map(|track| track.latest_frame())
    }

    /// Natural width/height of the current frame; `(0, 0)` before the first frame.
    pub fn video_size(&self) -> (u32, u32) {
        self.current_frame()
            .map(|frame| (frame.width, frame.height))
            .unwrap_or((0, 0))
    }
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Requests a stream; fails with [`KioskError::CameraUnavailable`].
    async fn open(&self, options: &StreamOptions) -> Result<MediaStream>;
    fn describe(&self) -> String;
}

/// Device chosen from `[camera].source`.
pub enum ConfiguredCamera {
    Synthetic(SyntheticCamera),
    Still(StillImageCamera),
}

impl ConfiguredCamera {
    pub fn from_config(config: &CameraConfig) -> Self {
        match &config.source {
            CameraSource::Synthetic => ConfiguredCamera::Synthetic(SyntheticCamera::new()),
            CameraSource::Still { path } => ConfiguredCamera::Still(StillImageCamera::new(path)),
        }
    }
}

#[async_trait]
impl CameraDevice for ConfiguredCamera {
    async fn open(&self, options: &StreamOptions) -> Result<MediaStream> {
        match self {
            ConfiguredCamera::Synthetic(camera) => camera.open(options).await,
            ConfiguredCamera::Still(camera) => camera.open(options).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            ConfiguredCamera::Synthetic(camera) => camera.describe(),
            ConfiguredCamera::Still(camera) => camera.describe(),
        }
    }
}

/// Owns the single active stream for one page and guarantees its release.
pub struct MediaStreamManager<D: CameraDevice> {
    device: D,
    active: Option<ActiveStream>,
}

struct ActiveStream {
    stream: MediaStream,
    sink: VideoSink,
}

impl<D: CameraDevice> MediaStreamManager<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            active: None,
        }
    }

    /// Opens a stream and attaches it to `sink`. A stream that is already
    /// active is stopped first so two handles never coexist.
    pub async fn start(&mut self, sink: &VideoSink, options: &StreamOptions) -> Result<MediaStream> {
        if self.active.is_some() {
            warn!("camera start requested while a stream is active; stopping previous stream");
            self.stop();
        }

        info!(
            "Requesting {:?}-facing stream at {}x{} from {}",
            options.facing_mode,
            options.ideal_width,
            options.ideal_height,
            self.device.describe()
        );
        let stream = self.device.open(options).await.map_err(|err| match err {
            KioskError::CameraUnavailable(_) => err,
            other => camera_error(other.to_string()),
        })?;

        sink.set_source(Some(stream.clone()));
        self.active = Some(ActiveStream {
            stream: stream.clone(),
            sink: sink.clone(),
        });
        info!("Camera stream {} active", stream.id);
        Ok(stream)
    }

    /// Halts every track and clears the handle. No-op when nothing is active.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stream.stop_all();
            active.sink.set_source(None);
            info!("Camera stream {} stopped", active.stream.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl<D: CameraDevice> Drop for MediaStreamManager<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn camera_error(message: impl Into<String>) -> KioskError {
    KioskError::CameraUnavailable(message.into())
}
