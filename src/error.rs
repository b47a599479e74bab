//! Error handling for cameo

use std::path::PathBuf;

/// Result type for cameo operations
pub type Result<T> = std::result::Result<T, CameoError>;

/// Errors that can occur while capturing, previewing or recording
#[derive(Debug, thiserror::Error)]
pub enum CameoError {
    /// The media backend reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// The capture device could not be opened
    #[error("Capture device {0} is unavailable")]
    DeviceUnavailable(i32),

    /// A video writer could not be created or rejected a frame
    #[error("Video writer error for {path}: {reason}")]
    VideoWriter { path: PathBuf, reason: String },

    /// Frame buffer does not match its declared geometry
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),
}

impl CameoError {
    pub fn backend(msg: impl Into<String>) -> Self {
        CameoError::Backend(msg.into())
    }

    pub fn video_writer(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CameoError::VideoWriter {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
