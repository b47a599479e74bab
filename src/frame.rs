//! Owned camera frames

use std::time::Instant;

use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::{ArrayView3, s};

use crate::common::{FrameSize, PixelFormat};
use crate::error::{CameoError, Result};

/// A decoded frame. `data` is interleaved, row-major, `width * height * channels` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp: Instant,
    pub frame_id: u64,
}

impl Frame {
    /// Wrap an existing buffer, checking that it matches the declared geometry.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = FrameSize::new(width, height).area() * format.channels();
        if data.len() != expected {
            return Err(CameoError::InvalidFrame(format!(
                "{width}x{height} {format} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Frame {
            data,
            width,
            height,
            format,
            timestamp: Instant::now(),
            frame_id: 0,
        })
    }

    /// Create an all-black frame
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        Frame {
            data: vec![0u8; FrameSize::new(width, height).area() * format.channels()],
            width,
            height,
            format,
            timestamp: Instant::now(),
            frame_id: 0,
        }
    }

    /// Create a BGR test pattern frame. `phase` shifts the pattern so consecutive frames differ.
    pub fn test_pattern(width: u32, height: u32, pattern: TestPattern, phase: u64) -> Self {
        let (w, h) = (width as usize, height as usize);
        let shift = phase as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let px = match pattern {
                    TestPattern::Gradient => {
                        let v = ((x + y + shift) % 256) as u8;
                        [v, (y % 256) as u8, (x % 256) as u8]
                    }
                    TestPattern::Checkerboard => {
                        let v = if ((x + shift) / 32 + y / 32) % 2 == 0 { 255 } else { 0 };
                        [v, v, v]
                    }
                    TestPattern::Noise => {
                        let v = noise_byte((y * w + x) as u64 ^ phase.rotate_left(32));
                        [v, v.rotate_left(3), v.rotate_left(5)]
                    }
                };
                data.extend_from_slice(&px);
            }
        }

        Frame {
            data,
            width,
            height,
            format: PixelFormat::Bgr8,
            timestamp: Instant::now(),
            frame_id: phase,
        }
    }

    /// Set frame ID for tracking
    pub fn with_frame_id(mut self, frame_id: u64) -> Self {
        self.frame_id = frame_id;
        self
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Borrow the pixels as a `(height, width, channels)` array.
    pub fn as_array(&self) -> Result<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, self.channels()),
            &self.data,
        )
        .map_err(|e| CameoError::InvalidFrame(format!("{}: {e}", self.describe())))
    }

    /// Horizontally flipped copy. The returned buffer never aliases `self`.
    pub fn mirrored(&self) -> Result<Frame> {
        let view = self.as_array()?;
        let data: Vec<u8> = view.slice(s![.., ..;-1, ..]).iter().copied().collect();
        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            format: self.format,
            timestamp: self.timestamp,
            frame_id: self.frame_id,
        })
    }

    /// Convert to an `image` buffer in RGB / luma order, for still encoding.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage> {
        let invalid = || CameoError::InvalidFrame(self.describe());
        match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(invalid),
            PixelFormat::Bgr8 => {
                let mut rgb = self.data.clone();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                RgbImage::from_raw(self.width, self.height, rgb)
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(invalid)
            }
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(invalid),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "#{} {} {} ({} bytes)",
            self.frame_id,
            self.size(),
            self.format,
            self.byte_len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    Gradient,
    Checkerboard,
    Noise,
}

// splitmix64 finalizer
fn noise_byte(seed: u64) -> u8 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> Frame {
        let data = (0..width * height * 3).map(|i| i as u8).collect();
        Frame::new(width, height, PixelFormat::Bgr8, data).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Frame::new(4, 4, PixelFormat::Bgr8, vec![0; 10]).unwrap_err();
        assert!(matches!(err, CameoError::InvalidFrame(_)));
    }

    #[test]
    fn test_mirrored_flips_columns() {
        let frame = numbered(3, 2);
        let mirrored = frame.mirrored().unwrap();

        // Row 0: pixels [0,1,2] [3,4,5] [6,7,8] become [6,7,8] [3,4,5] [0,1,2].
        assert_eq!(&mirrored.data[0..9], &[6, 7, 8, 3, 4, 5, 0, 1, 2]);
        assert_eq!(&mirrored.data[9..18], &[15, 16, 17, 12, 13, 14, 9, 10, 11]);
        assert_eq!(mirrored.size(), frame.size());
    }

    #[test]
    fn test_mirrored_twice_is_identity() {
        let frame = Frame::test_pattern(17, 5, TestPattern::Noise, 3);
        assert_eq!(frame.mirrored().unwrap().mirrored().unwrap().data, frame.data);
    }

    #[test]
    fn test_mirrored_does_not_alias() {
        let frame = numbered(4, 4);
        let mut mirrored = frame.mirrored().unwrap();
        assert_ne!(mirrored.data.as_ptr(), frame.data.as_ptr());

        mirrored.data.iter_mut().for_each(|b| *b = 0xAA);
        assert_eq!(frame.data, numbered(4, 4).data);
    }

    #[test]
    fn test_to_dynamic_image_swaps_bgr() {
        let frame = Frame::new(1, 1, PixelFormat::Bgr8, vec![10, 20, 30]).unwrap();
        let rgb = frame.to_dynamic_image().unwrap().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn test_gray_frame_array_shape() {
        let frame = Frame::blank(8, 2, PixelFormat::Gray8);
        assert_eq!(frame.as_array().unwrap().shape(), &[2, 8, 1]);
        assert!(matches!(frame.to_dynamic_image().unwrap(), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_pattern_phase_changes_content() {
        let a = Frame::test_pattern(64, 8, TestPattern::Gradient, 0);
        let b = Frame::test_pattern(64, 8, TestPattern::Gradient, 1);
        assert_ne!(a.data, b.data);
        assert_eq!(a.byte_len(), 64 * 8 * 3);
        assert_eq!(b.frame_id, 1);
    }
}
