use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A decoded video frame as the sink currently holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel buffer, row-major.
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl ImageFrame {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Output encoding for captured stills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureFormat {
    #[default]
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl CaptureFormat {
    pub fn mime(self) -> &'static str {
        match self {
            CaptureFormat::Jpeg => "image/jpeg",
            CaptureFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            CaptureFormat::Jpeg => "jpg",
            CaptureFormat::Png => "png",
        }
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(CaptureFormat::Jpeg),
            "image/png" => Some(CaptureFormat::Png),
            _ => None,
        }
    }
}

/// An encoded still, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    pub format: CaptureFormat,
    pub captured_at: DateTime<Utc>,
}

/// Binary form of a capture, as uploaded in multipart requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBlob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FrameBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Suggested upload file name derived from the MIME type.
    pub fn file_name(&self) -> String {
        let ext = CaptureFormat::from_mime(&self.mime)
            .map(CaptureFormat::extension)
            .unwrap_or("bin");
        format!("capture.{ext}")
    }
}
