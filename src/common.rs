use std::fmt;

use serde::{Deserialize, Serialize};

/// Pixel layout of a [`crate::frame::Frame`] buffer.
///
/// All formats are 8 bits per channel, interleaved, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Blue-green-red, the native layout of most capture devices.
    Bgr8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Gray8 => 1,
        }
    }

    pub fn is_color(self) -> bool {
        self.channels() > 1
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bgr8 => "BGR8",
            Self::Rgb8 => "RGB8",
            Self::Gray8 => "GRAY8",
        };
        f.write_str(name)
    }
}

/// Frame geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Key codes understood by the command dispatcher (lowest 8 bits of the raw code).
pub mod keys {
    pub const TAB: u8 = 9;
    pub const ESCAPE: u8 = 27;
    pub const SPACE: u8 = 32;

    /// Raw code returned by a key poll when nothing was pressed.
    pub const NO_KEY: i32 = -1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_channels() {
        assert_eq!(PixelFormat::Bgr8.channels(), 3);
        assert_eq!(PixelFormat::Gray8.channels(), 1);
        assert!(!PixelFormat::Gray8.is_color());
    }

    #[test]
    fn test_frame_size_display() {
        assert_eq!(FrameSize::new(640, 480).to_string(), "640x480");
        assert_eq!(FrameSize::new(640, 480).area(), 307_200);
    }
}
