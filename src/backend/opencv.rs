//! OpenCV-backed capture, encoding and display.

use std::path::Path;
use std::time::Duration;

use opencv::core::{self, Mat, Scalar, Size, Vector};
use opencv::prelude::*;
use opencv::{highgui, imgcodecs, videoio};
use tracing::{debug, info, warn};

use crate::backend::{CaptureBackend, DisplayBackend};
use crate::common::{FrameSize, PixelFormat};
use crate::error::{CameoError, Result};
use crate::frame::Frame;
use crate::video_encoder::{EncodingSpec, VideoSink};

/// A camera opened through `videoio`.
pub struct OpenCvCapture {
    capture: videoio::VideoCapture,
    device_index: i32,
    next_frame_id: u64,
}

impl OpenCvCapture {
    pub fn open(device_index: i32) -> Result<Self> {
        let capture = videoio::VideoCapture::new(device_index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(CameoError::DeviceUnavailable(device_index));
        }
        info!(device = device_index, "capture device opened");
        Ok(Self {
            capture,
            device_index,
            next_frame_id: 0,
        })
    }
}

impl CaptureBackend for OpenCvCapture {
    type Writer = OpenCvVideoWriter;

    fn grab(&mut self) -> Result<bool> {
        Ok(self.capture.grab()?)
    }

    fn retrieve(&mut self, channel: u32) -> Result<Option<Frame>> {
        let mut mat = Mat::default();
        let ok = self.capture.retrieve(&mut mat, channel as i32)?;
        if !ok || mat.empty() {
            return Ok(None);
        }
        let frame = mat_to_frame(&mat)?.with_frame_id(self.next_frame_id);
        self.next_frame_id += 1;
        Ok(Some(frame))
    }

    fn reported_fps(&self) -> Option<f64> {
        match self.capture.get(videoio::CAP_PROP_FPS) {
            Ok(fps) if fps > 0.0 => Some(fps),
            Ok(_) => None,
            Err(e) => {
                debug!("CAP_PROP_FPS unavailable: {e}");
                None
            }
        }
    }

    fn write_image(&mut self, path: &Path, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        if imgcodecs::imwrite(path_str(path)?, &mat, &Vector::new())? {
            Ok(())
        } else {
            Err(CameoError::backend(format!(
                "imwrite could not encode {}",
                path.display()
            )))
        }
    }

    fn open_video_writer(
        &mut self,
        path: &Path,
        spec: &EncodingSpec,
        fps: f64,
        size: FrameSize,
    ) -> Result<OpenCvVideoWriter> {
        let writer = videoio::VideoWriter::new(
            path_str(path)?,
            spec.fourcc.code(),
            fps,
            Size::new(size.width as i32, size.height as i32),
            spec.is_color,
        )?;
        if !writer.is_opened()? {
            return Err(CameoError::video_writer(
                path,
                format!("no encoder accepted fourcc {}", spec.fourcc),
            ));
        }
        Ok(OpenCvVideoWriter { writer })
    }
}

impl Drop for OpenCvCapture {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(device = self.device_index, "failed to release capture device: {e}");
        }
    }
}

pub struct OpenCvVideoWriter {
    writer: videoio::VideoWriter,
}

impl VideoSink for OpenCvVideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        self.writer.write(&mat)?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.writer.release()?;
        Ok(())
    }
}

/// `highgui` windows and key input.
#[derive(Debug, Default)]
pub struct OpenCvDisplay;

impl OpenCvDisplay {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayBackend for OpenCvDisplay {
    fn create_window(&mut self, name: &str) -> Result<()> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(())
    }

    fn show(&mut self, name: &str, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        highgui::imshow(name, &mat)?;
        Ok(())
    }

    fn destroy_window(&mut self, name: &str) -> Result<()> {
        highgui::destroy_window(name)?;
        Ok(())
    }

    fn wait_key(&mut self, timeout: Duration) -> Result<i32> {
        // wait_key(0) blocks forever.
        let millis = timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        Ok(highgui::wait_key(millis)?)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        CameoError::InvalidConfiguration(format!("path is not valid UTF-8: {}", path.display()))
    })
}

fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    let format = match mat.typ() {
        t if t == core::CV_8UC3 => PixelFormat::Bgr8,
        t if t == core::CV_8UC1 => PixelFormat::Gray8,
        t => {
            return Err(CameoError::InvalidFrame(format!(
                "unsupported Mat type {t} ({} channels)",
                mat.channels()
            )));
        }
    };
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };
    Frame::new(width, height, format, data)
}

fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let typ = match frame.format {
        PixelFormat::Bgr8 | PixelFormat::Rgb8 => core::CV_8UC3,
        PixelFormat::Gray8 => core::CV_8UC1,
    };
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        typ,
        Scalar::all(0.0),
    )?;
    let dst = mat.data_bytes_mut()?;
    if dst.len() != frame.data.len() {
        return Err(CameoError::InvalidFrame(frame.describe()));
    }
    dst.copy_from_slice(&frame.data);
    if frame.format == PixelFormat::Rgb8 {
        for px in dst.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
    }
    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TestPattern;

    #[test]
    fn test_frame_mat_round_trip_keeps_bgr() {
        let frame = Frame::test_pattern(32, 8, TestPattern::Noise, 5);
        let mat = frame_to_mat(&frame).unwrap();
        assert_eq!(mat.cols(), 32);
        assert_eq!(mat.rows(), 8);
        let back = mat_to_frame(&mat).unwrap();
        assert_eq!(back.data, frame.data);
        assert_eq!(back.format, PixelFormat::Bgr8);
    }

    #[test]
    fn test_rgb_frame_is_swapped_for_opencv() {
        let frame = Frame::new(1, 1, PixelFormat::Rgb8, vec![1, 2, 3]).unwrap();
        let mat = frame_to_mat(&frame).unwrap();
        assert_eq!(mat.data_bytes().unwrap(), &[3, 2, 1]);
    }

    #[test]
    #[ignore] // Requires a camera
    fn test_open_default_device() {
        let mut capture = OpenCvCapture::open(0).expect("no camera at index 0");
        assert!(capture.grab().unwrap());
        let frame = capture.retrieve(0).unwrap().expect("camera returned no frame");
        assert!(frame.width > 0 && frame.height > 0);
    }
}
