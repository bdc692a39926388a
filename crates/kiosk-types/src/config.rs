use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{frame::CaptureFormat, KioskError, Result};

/// Largest accepted camera.width / camera.height.
pub const MAX_CAMERA_DIMENSION: u32 = 8192;

/// Which camera the stream request should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// Device backing the kiosk camera.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    /// Generated test pattern at the requested resolution.
    #[default]
    Synthetic,
    /// A still image on disk replayed as a live feed.
    Still { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub facing_mode: FacingMode,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub source: CameraSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub format: CaptureFormat,
    pub jpeg_quality: u8,
}

/// How captured frames travel to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTransport {
    /// JSON body carrying a `data:` URI.
    #[default]
    DataUri,
    /// `multipart/form-data` with a binary `image` part.
    Multipart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub image_transport: ImageTransport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub backend: BackendConfig,
    pub ops: OpsConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::User,
            width: 640,
            height: 480,
            source: CameraSource::Synthetic,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: CaptureFormat::Jpeg,
            jpeg_quality: 92,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            timeout_ms: 15_000,
            image_transport: ImageTransport::DataUri,
        }
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            capture: CaptureConfig::default(),
            backend: BackendConfig::default(),
            ops: OpsConfig::default(),
        }
    }
}

impl KioskConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            KioskError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            KioskError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(KioskError::Configuration(
                "camera.width and camera.height must be greater than zero".into(),
            ));
        }
        if self.camera.width > MAX_CAMERA_DIMENSION || self.camera.height > MAX_CAMERA_DIMENSION {
            return Err(KioskError::Configuration(format!(
                "camera.width and camera.height must not exceed {MAX_CAMERA_DIMENSION}"
            )));
        }
        if let CameraSource::Still { path } = &self.camera.source {
            if path.trim().is_empty() {
                return Err(KioskError::Configuration(
                    "camera.source.path must not be empty".into(),
                ));
            }
        }
        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(KioskError::Configuration(
                "capture.jpeg_quality must be between 1 and 100".into(),
            ));
        }
        let base = self.backend.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(KioskError::Configuration(
                "backend.base_url must be an http(s) URL".into(),
            ));
        }
        if self.backend.timeout_ms == 0 {
            return Err(KioskError::Configuration(
                "backend.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_kiosk_config_from_file() {
        let temp_path = std::env::temp_dir().join("kiosk-config-test.toml");
        let config = KioskConfig {
            camera: CameraConfig {
                facing_mode: FacingMode::Environment,
                width: 1280,
                height: 720,
                source: CameraSource::Still {
                    path: "fixtures/face.png".into(),
                },
            },
            capture: CaptureConfig {
                format: CaptureFormat::Png,
                jpeg_quality: 80,
            },
            backend: BackendConfig {
                base_url: "http://10.0.0.5:5000".into(),
                timeout_ms: 5_000,
                image_transport: ImageTransport::Multipart,
            },
            ops: OpsConfig {
                log_level: "debug".into(),
            },
        };

        let doc = toml::to_string(&config).expect("serialize config");
        fs::write(&temp_path, doc).expect("write temp config");

        let loaded = KioskConfig::from_file(&temp_path).expect("load config");
        assert_eq!(loaded.camera.facing_mode, FacingMode::Environment);
        assert_eq!(loaded.camera.source, config.camera.source);
        assert_eq!(loaded.capture.format, CaptureFormat::Png);
        assert_eq!(loaded.backend.image_transport, ImageTransport::Multipart);
        fs::remove_file(&temp_path).expect("cleanup temp config");
    }

    #[test]
    fn minimal_file_uses_defaults_for_optional_fields() {
        let doc = r#"
            [camera]
            width = 640
            height = 480

            [capture]
            jpeg_quality = 90

            [backend]
            base_url = "http://localhost:5000"
            timeout_ms = 1000

            [ops]
            log_level = "info"
        "#;
        let config: KioskConfig = toml::from_str(doc).expect("parse config");
        assert_eq!(config.camera.facing_mode, FacingMode::User);
        assert_eq!(config.camera.source, CameraSource::Synthetic);
        assert_eq!(config.capture.format, CaptureFormat::Jpeg);
        assert_eq!(config.backend.image_transport, ImageTransport::DataUri);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_configuration_rules() {
        let mut config = KioskConfig::default();
        assert!(config.validate().is_ok());

        config.camera.width = 0;
        assert!(config.validate().is_err());
        config.camera.width = 640;
        config.capture.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.capture.jpeg_quality = 92;
        config.backend.base_url = "ftp://example".into();
        assert!(config.validate().is_err());
        config.backend.base_url = "https://kiosk.example".into();
        config.backend.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.backend.timeout_ms = 1;
        config.camera.source = CameraSource::Still { path: " ".into() };
        assert!(config.validate().is_err());
        config.camera.source = CameraSource::Synthetic;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_camera_resolution_is_rejected() {
        let mut config = KioskConfig::default();
        config.camera.width = MAX_CAMERA_DIMENSION;
        config.camera.height = MAX_CAMERA_DIMENSION;
        assert!(config.validate().is_ok());

        config.camera.width = 70_000;
        assert!(matches!(config.validate(), Err(KioskError::Configuration(_))));
        config.camera.width = 640;
        config.camera.height = u32::MAX;
        assert!(config.validate().is_err());
    }
}
