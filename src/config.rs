use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CameoError, Result};
use crate::video_encoder::EncodingSpec;

/// Everything the application needs to know up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameoConfig {
    /// Index of the capture device.
    pub device_index: i32,
    pub window_name: String,
    /// Written on every screenshot request, overwriting the previous one.
    pub screenshot_path: PathBuf,
    pub video_path: PathBuf,
    pub encoding: EncodingSpec,
    /// Flip the preview horizontally. Saved files are never mirrored.
    pub mirror_preview: bool,
}

impl Default for CameoConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            window_name: "Cameo".to_string(),
            screenshot_path: PathBuf::from("screenshot.png"),
            video_path: PathBuf::from("screencast.avi"),
            encoding: EncodingSpec::default(),
            mirror_preview: true,
        }
    }
}

impl CameoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_name.trim().is_empty() {
            return Err(CameoError::InvalidConfiguration(
                "window name must not be empty".to_string(),
            ));
        }
        if self.screenshot_path.as_os_str().is_empty() {
            return Err(CameoError::InvalidConfiguration(
                "screenshot path must not be empty".to_string(),
            ));
        }
        if self.video_path.as_os_str().is_empty() {
            return Err(CameoError::InvalidConfiguration(
                "video path must not be empty".to_string(),
            ));
        }
        if self.device_index < 0 {
            return Err(CameoError::InvalidConfiguration(format!(
                "device index must be >= 0, got {}",
                self.device_index
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video_encoder::Fourcc;

    #[test]
    fn test_defaults() {
        let config = CameoConfig::default();
        assert_eq!(config.device_index, 0);
        assert_eq!(config.encoding.fourcc, Fourcc::I420);
        assert!(config.mirror_preview);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_paths() {
        let config = CameoConfig {
            video_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CameoError::InvalidConfiguration(_))
        ));

        let config = CameoConfig {
            window_name: "  ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CameoConfig =
            serde_json::from_str(r#"{"device_index": 1, "encoding": {"fourcc": "MJPG", "is_color": true}}"#)
                .unwrap();
        assert_eq!(config.device_index, 1);
        assert_eq!(config.encoding.fourcc, Fourcc::MJPG);
        assert_eq!(config.window_name, "Cameo");
    }
}
