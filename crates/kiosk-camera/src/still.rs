use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use kiosk_types::{frame::ImageFrame, Result};
use tracing::info;
use uuid::Uuid;

use crate::{camera_error, CameraDevice, MediaStream, MediaTrack, StreamOptions};

/// Replays a still image from disk as a live feed at the image's native size.
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn open(&self, options: &StreamOptions) -> Result<MediaStream> {
        let raw = tokio::fs::read(&self.path).await.map_err(|err| {
            camera_error(format!("unable to read {}: {err}", self.path.display()))
        })?;
        let img = image::load_from_memory(&raw).map_err(|err| {
            camera_error(format!("unable to decode {}: {err}", self.path.display()))
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        info!(
            "Still camera serving {} at {}x{} (ideal {}x{})",
            self.path.display(),
            width,
            height,
            options.ideal_width,
            options.ideal_height
        );

        let track = StillTrack {
            id: Uuid::new_v4().to_string(),
            width,
            height,
            pixels: Arc::new(rgba.into_raw()),
            live: AtomicBool::new(true),
        };
        Ok(MediaStream::new(vec![Arc::new(track) as Arc<dyn MediaTrack>]))
    }

    fn describe(&self) -> String {
        format!("still image {}", self.path.display())
    }
}

struct StillTrack {
    id: String,
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
    live: AtomicBool,
}

impl MediaTrack for StillTrack {
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
        if !self.is_live() {
            return None;
        }
        Some(ImageFrame::from_rgba(
            self.width,
            self.height,
            self.pixels.as_ref().clone(),
        ))
    }
}
