//! Media backend capabilities.
//!
//! Everything that touches a device, a codec or the screen goes through these traits.
//! [`synthetic`] is an in-process implementation; `opencv` (feature `opencv`) drives real
//! hardware.

#[cfg(feature = "opencv")]
pub mod opencv;
pub mod synthetic;

use std::path::Path;
use std::time::Duration;

use crate::common::FrameSize;
use crate::error::Result;
use crate::frame::Frame;
use crate::video_encoder::{EncodingSpec, VideoSink};

/// A capture device plus the still and video encoders bound to it.
pub trait CaptureBackend {
    type Writer: VideoSink;

    /// Capture the next raw frame into the device buffer without decoding it.
    ///
    /// Returns `false` when the device produced nothing.
    fn grab(&mut self) -> Result<bool>;

    /// Decode the most recently grabbed frame. `None` if there is nothing to decode.
    fn retrieve(&mut self, channel: u32) -> Result<Option<Frame>>;

    /// Frame rate reported by the device, `None` when unknown.
    fn reported_fps(&self) -> Option<f64>;

    fn write_image(&mut self, path: &Path, frame: &Frame) -> Result<()>;

    fn open_video_writer(
        &mut self,
        path: &Path,
        spec: &EncodingSpec,
        fps: f64,
        size: FrameSize,
    ) -> Result<Self::Writer>;
}

/// Named windows and keyboard input.
pub trait DisplayBackend {
    fn create_window(&mut self, name: &str) -> Result<()>;

    fn show(&mut self, name: &str, frame: &Frame) -> Result<()>;

    fn destroy_window(&mut self, name: &str) -> Result<()>;

    /// Wait up to `timeout` for a key press and return its raw code, or
    /// [`crate::common::keys::NO_KEY`]. Also pumps window rendering.
    fn wait_key(&mut self, timeout: Duration) -> Result<i32>;
}

impl<T: CaptureBackend + ?Sized> CaptureBackend for Box<T> {
    type Writer = T::Writer;

    fn grab(&mut self) -> Result<bool> {
        (**self).grab()
    }

    fn retrieve(&mut self, channel: u32) -> Result<Option<Frame>> {
        (**self).retrieve(channel)
    }

    fn reported_fps(&self) -> Option<f64> {
        (**self).reported_fps()
    }

    fn write_image(&mut self, path: &Path, frame: &Frame) -> Result<()> {
        (**self).write_image(path, frame)
    }

    fn open_video_writer(
        &mut self,
        path: &Path,
        spec: &EncodingSpec,
        fps: f64,
        size: FrameSize,
    ) -> Result<Self::Writer> {
        (**self).open_video_writer(path, spec, fps, size)
    }
}

impl<T: DisplayBackend + ?Sized> DisplayBackend for Box<T> {
    fn create_window(&mut self, name: &str) -> Result<()> {
        (**self).create_window(name)
    }

    fn show(&mut self, name: &str, frame: &Frame) -> Result<()> {
        (**self).show(name, frame)
    }

    fn destroy_window(&mut self, name: &str) -> Result<()> {
        (**self).destroy_window(name)
    }

    fn wait_key(&mut self, timeout: Duration) -> Result<i32> {
        (**self).wait_key(timeout)
    }
}
