//! Frame encoding: snapshots of the video sink as data URIs or binary blobs.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgba};
use kiosk_camera::VideoSink;
use kiosk_types::{
    config::CaptureConfig,
    frame::{CaptureFormat, CapturedFrame, FrameBlob, ImageFrame},
    KioskError, Result,
};
use tracing::debug;

/// Rasterizes the sink's current frame into a transportable still.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    format: CaptureFormat,
    jpeg_quality: u8,
}

impl FrameEncoder {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            format: config.format,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Snapshot of the most recent decoded frame in the configured format.
    pub fn capture_frame(&self, sink: &VideoSink) -> Result<CapturedFrame> {
        self.capture_frame_as(sink, self.format)
    }

    pub fn capture_frame_as(&self, sink: &VideoSink, format: CaptureFormat) -> Result<CapturedFrame> {
        let frame = sink.current_frame().ok_or(KioskError::EmptySink)?;
        encode_frame(&frame, format, self.jpeg_quality)
    }

    /// Same snapshot as [`capture_frame`](Self::capture_frame), decoded back to bytes.
    pub fn capture_blob(&self, sink: &VideoSink, format: CaptureFormat) -> Result<FrameBlob> {
        let captured = self.capture_frame_as(sink, format)?;
        data_uri_to_blob(&captured.data_uri)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}

pub fn encode_frame(frame: &ImageFrame, format: CaptureFormat, jpeg_quality: u8) -> Result<CapturedFrame> {
    if frame.is_empty() {
        return Err(KioskError::EmptySink);
    }
    let Some(buffer) =
        ImageBuffer::<Rgba<u8>, _>::from_raw(frame.width, frame.height, frame.data.clone())
    else {
        return Err(vision_error(format!(
            "pixel buffer does not match {}x{}",
            frame.width, frame.height
        )));
    };

    let image = DynamicImage::ImageRgba8(buffer);
    let mut bytes = Vec::new();
    let result = match format {
        CaptureFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Jpeg(jpeg_quality)),
        CaptureFormat::Png => image.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png),
    };
    result.map_err(|err| vision_error(format!("failed to encode {}: {err}", format.mime())))?;

    debug!(
        "Encoded {}x{} frame as {} ({} bytes)",
        frame.width,
        frame.height,
        format.mime(),
        bytes.len()
    );
    Ok(CapturedFrame {
        data_uri: format!("data:{};base64,{}", format.mime(), STANDARD.encode(&bytes)),
        width: frame.width,
        height: frame.height,
        format,
        captured_at: frame.captured_at,
    })
}

/// Decodes `data:<mime>;base64,<payload>` into its bytes and MIME type.
pub fn data_uri_to_blob(data_uri: &str) -> Result<FrameBlob> {
    let (header, payload) = data_uri
        .split_once(',')
        .ok_or_else(|| KioskError::InvalidDataUri("missing ',' separator".into()))?;
    let meta = header
        .strip_prefix("data:")
        .ok_or_else(|| KioskError::InvalidDataUri("missing 'data:' scheme".into()))?;
    let (mime, params) = meta
        .split_once(';')
        .ok_or_else(|| KioskError::InvalidDataUri("missing ';base64' marker".into()))?;
    if !params.split(';').any(|param| param == "base64") {
        return Err(KioskError::InvalidDataUri("payload is not base64".into()));
    }
    if mime.is_empty() {
        return Err(KioskError::InvalidDataUri("empty MIME type".into()));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| KioskError::InvalidDataUri(format!("bad base64 payload: {err}")))?;
    Ok(FrameBlob {
        mime: mime.to_string(),
        bytes,
    })
}

pub fn vision_error(message: impl Into<String>) -> KioskError {
    KioskError::Encoding(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_camera::{CameraDevice, MediaStreamManager, StreamOptions, SyntheticCamera};

    fn checker(width: u32, height: u32) -> ImageFrame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        ImageFrame::from_rgba(width, height, data)
    }

    async fn live_sink(camera: SyntheticCamera) -> (MediaStreamManager<SyntheticCamera>, VideoSink) {
        let mut manager = MediaStreamManager::new(camera);
        let sink = VideoSink::new();
        let options = StreamOptions {
            ideal_width: 32,
            ideal_height: 24,
            ..StreamOptions::default()
        };
        manager.start(&sink, &options).await.expect("start stream");
        (manager, sink)
    }

    #[test]
    fn data_uri_round_trips_to_blob() {
        let captured = encode_frame(&checker(16, 8), CaptureFormat::Png, 90).expect("encode");
        assert!(captured.data_uri.starts_with("data:image/png;base64,"));

        let blob = data_uri_to_blob(&captured.data_uri).expect("decode");
        let payload = captured.data_uri.split_once(',').map(|(_, p)| p).unwrap_or("");
        let expected = STANDARD.decode(payload).expect("payload decodes");
        assert_eq!(blob.mime, "image/png");
        assert_eq!(blob.len(), expected.len());

        let decoded = image::load_from_memory(&blob.bytes).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn jpeg_capture_keeps_native_dimensions() {
        let captured = encode_frame(&checker(40, 30), CaptureFormat::Jpeg, 80).expect("encode");
        assert_eq!((captured.width, captured.height), (40, 30));
        let blob = data_uri_to_blob(&captured.data_uri).expect("decode");
        assert_eq!(blob.mime, "image/jpeg");
        let decoded = image::load_from_memory(&blob.bytes).expect("valid jpeg");
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn zero_sized_frame_is_empty_sink() {
        let err = encode_frame(&ImageFrame::empty(), CaptureFormat::Jpeg, 90).expect_err("empty");
        assert!(matches!(err, KioskError::EmptySink));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let frame = ImageFrame::from_rgba(4, 4, vec![0; 10]);
        let err = encode_frame(&frame, CaptureFormat::Png, 90).expect_err("bad buffer");
        assert!(matches!(err, KioskError::Encoding(_)));
    }

    #[test]
    fn malformed_data_uris_are_rejected() {
        for uri in [
            "image/png;base64,AAAA",
            "data:image/png;base64",
            "data:image/png,AAAA",
            "data:;base64,AAAA",
            "data:image/png;base64,***",
        ] {
            assert!(
                matches!(data_uri_to_blob(uri), Err(KioskError::InvalidDataUri(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn capture_from_live_sink() {
        let (_manager, sink) = live_sink(SyntheticCamera::new()).await;
        let encoder = FrameEncoder::default();
        let captured = encoder.capture_frame(&sink).expect("capture");
        assert_eq!((captured.width, captured.height), (32, 24));
        assert_eq!(captured.format, CaptureFormat::Jpeg);

        let blob = encoder
            .capture_blob(&sink, CaptureFormat::Png)
            .expect("capture blob");
        assert_eq!(blob.mime, "image/png");
        assert!(!blob.is_empty());
    }

    #[tokio::test]
    async fn capture_before_first_frame_fails() {
        let camera = SyntheticCamera::new();
        camera.set_frames_ready(false);
        let (_manager, sink) = live_sink(camera.clone()).await;
        let err = FrameEncoder::default()
            .capture_frame(&sink)
            .expect_err("no frame yet");
        assert!(matches!(err, KioskError::EmptySink));
        assert!(camera.describe().contains("synthetic"));
    }

    #[test]
    fn capture_from_detached_sink_fails() {
        let err = FrameEncoder::default()
            .capture_frame(&VideoSink::new())
            .expect_err("detached");
        assert!(matches!(err, KioskError::EmptySink));
    }
}
