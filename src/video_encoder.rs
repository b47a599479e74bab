use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CameoError, Result};
use crate::frame::Frame;

/// Four-character codec identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fourcc(pub [u8; 4]);

impl Fourcc {
    /// Uncompressed planar YUV 4:2:0.
    pub const I420: Fourcc = Fourcc(*b"I420");
    pub const MJPG: Fourcc = Fourcc(*b"MJPG");
    pub const XVID: Fourcc = Fourcc(*b"XVID");
    pub const MP4V: Fourcc = Fourcc(*b"MP4V");
    pub const H264: Fourcc = Fourcc(*b"H264");

    /// Packed code, first character in the lowest byte.
    pub fn code(self) -> i32 {
        i32::from_le_bytes(self.0)
    }

    pub fn from_code(code: i32) -> Self {
        Fourcc(code.to_le_bytes())
    }
}

impl Default for Fourcc {
    fn default() -> Self {
        Fourcc::I420
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &c in &self.0 {
            if c.is_ascii_graphic() || c == b' ' {
                write!(f, "{}", c as char)?;
            } else {
                write!(f, "\\x{c:02x}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Fourcc {
    type Err = CameoError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !s.is_ascii() {
            return Err(CameoError::InvalidConfiguration(format!(
                "fourcc must be exactly four ASCII characters, got {s:?}"
            )));
        }
        Ok(Fourcc([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Serialize for Fourcc {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fourcc {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Codec and container parameters for a video writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingSpec {
    pub fourcc: Fourcc,
    /// Encode three-channel frames. Grayscale writers expect single-channel input.
    pub is_color: bool,
}

impl EncodingSpec {
    pub fn new(fourcc: Fourcc) -> Self {
        Self {
            fourcc,
            is_color: true,
        }
    }
}

impl Default for EncodingSpec {
    fn default() -> Self {
        Self::new(Fourcc::I420)
    }
}

/// An open video file accepting frames of one fixed size.
pub trait VideoSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close. Dropping the sink must release it as well.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: VideoSink + ?Sized> VideoSink for Box<T> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn release(&mut self) -> Result<()> {
        (**self).release()
    }
}
