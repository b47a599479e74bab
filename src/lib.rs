pub mod app;
pub mod backend;
pub mod capture;
pub mod common;
pub mod config;
pub mod error;
pub mod frame;
pub mod video_encoder;
#[cfg(feature = "rerun")]
pub mod visualization;
pub mod window;

// Re-export main types for convenience
pub use crate::app::{Cameo, Command};
pub use crate::backend::{CaptureBackend, DisplayBackend};
pub use crate::capture::{
    FPS_WARMUP_FRAMES, FrameReport, FrameSession, PreviewSink, RecordingState, SessionStats,
    VideoOutcome,
};
pub use crate::common::{FrameSize, PixelFormat};
pub use crate::config::CameoConfig;
pub use crate::error::{CameoError, Result};
pub use crate::frame::{Frame, TestPattern};
pub use crate::video_encoder::{EncodingSpec, Fourcc, VideoSink};
pub use crate::window::WindowController;
