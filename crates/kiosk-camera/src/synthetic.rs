use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use kiosk_types::{frame::ImageFrame, Result};
use tokio::time::{sleep, Duration};
use tracing::info;
use uuid::Uuid;

use crate::{camera_error, CameraDevice, MediaStream, MediaTrack, StreamOptions};

/// Camera producing a moving gradient at the requested ideal resolution.
/// Handles are cheap clones sharing the same device state.
#[derive(Clone)]
pub struct SyntheticCamera {
    fail_with: Option<String>,
    frames_ready: Arc<AtomicBool>,
    open_count: Arc<AtomicUsize>,
    tracks: Arc<Mutex<Vec<Arc<SyntheticTrack>>>>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            frames_ready: Arc::new(AtomicBool::new(true)),
            open_count: Arc::new(AtomicUsize::new(0)),
            tracks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A device whose every open request is refused.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::new()
        }
    }

    /// Controls whether tracks have decoded a first frame yet.
    pub fn set_frames_ready(&self, ready: bool) {
        self.frames_ready.store(ready, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks
            .lock()
            .map(|tracks| tracks.iter().filter(|t| t.is_live()).count())
            .unwrap_or(0)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraDevice for SyntheticCamera {
    async fn open(&self, options: &StreamOptions) -> Result<MediaStream> {
        sleep(Duration::from_millis(5)).await;
        if let Some(reason) = &self.fail_with {
            return Err(camera_error(reason.clone()));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);

        let track = Arc::new(SyntheticTrack {
            id: Uuid::new_v4().to_string(),
            width: options.ideal_width,
            height: options.ideal_height,
            live: AtomicBool::new(true),
            ready: self.frames_ready.clone(),
            sequence: AtomicU64::new(0),
        });
        if let Ok(mut tracks) = self.tracks.lock() {
            tracks.push(track.clone());
        }
        info!(
            "Synthetic camera opened track {} ({}x{}, {:?})",
            track.id, track.width, track.height, options.facing_mode
        );
        Ok(MediaStream::new(vec![track as Arc<dyn MediaTrack>]))
    }

    fn describe(&self) -> String {
        "synthetic camera".into()
    }
}

struct SyntheticTrack {
    id: String,
    width: u32,
    height: u32,
    live: AtomicBool,
    ready: Arc<AtomicBool>,
    sequence: AtomicU64,
}

impl MediaTrack for SyntheticTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn latest_frame(&self) -> Option<ImageFrame> {
        if !self.is_live() || !self.ready.load(Ordering::SeqCst) {
            return None;
        }
        let shift = (self.sequence.fetch_add(1, Ordering::Relaxed) % 256) as u32;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = ((x * 255) / self.width.max(1) + shift) % 256;
                let g = ((y * 255) / self.height.max(1)) % 256;
                data.extend_from_slice(&[r as u8, g as u8, 128, 255]);
            }
        }
        Some(ImageFrame::from_rgba(self.width, self.height, data))
    }
}
