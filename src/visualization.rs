//! Preview sink streaming frames to a Rerun viewer.

use rerun as rr;
use tracing::info;

use crate::capture::PreviewSink;
use crate::common::PixelFormat;
use crate::error::{CameoError, Result};
use crate::frame::Frame;

pub struct RerunPreview {
    rec: rr::RecordingStream,
    entity_path: String,
    frame_index: i64,
}

impl RerunPreview {
    /// Spawn a native viewer (the `rerun` binary must be on `PATH`) and stream to it.
    pub fn spawn(app_id: &str, entity_path: impl Into<String>) -> Result<Self> {
        let rec = rr::RecordingStreamBuilder::new(app_id)
            .spawn()
            .map_err(rerun_err)?;
        let entity_path = entity_path.into();
        info!(entity = %entity_path, "rerun preview started (viewer=native)");
        Ok(Self {
            rec,
            entity_path,
            frame_index: 0,
        })
    }

    /// Record the preview into an `.rrd` file instead.
    pub fn save(app_id: &str, entity_path: impl Into<String>, file_path: &str) -> Result<Self> {
        let rec = rr::RecordingStreamBuilder::new(app_id)
            .save(file_path)
            .map_err(rerun_err)?;
        Ok(Self {
            rec,
            entity_path: entity_path.into(),
            frame_index: 0,
        })
    }
}

impl PreviewSink for RerunPreview {
    fn show_preview(&mut self, frame: &Frame) -> Result<()> {
        let size = [frame.width, frame.height];
        let image = match frame.format {
            PixelFormat::Rgb8 => rr::Image::from_rgb24(frame.data.clone(), size),
            PixelFormat::Bgr8 => {
                let mut rgb = frame.data.clone();
                for chunk in rgb.chunks_exact_mut(3) {
                    chunk.swap(0, 2);
                }
                rr::Image::from_rgb24(rgb, size)
            }
            PixelFormat::Gray8 => rr::Image::from_l8(frame.data.clone(), size),
        };

        self.rec.set_time_sequence("frame", self.frame_index);
        self.frame_index += 1;
        self.rec
            .log(self.entity_path.as_str(), &image)
            .map_err(rerun_err)
    }
}

fn rerun_err(err: impl std::fmt::Display) -> CameoError {
    CameoError::backend(format!("rerun error: {err}"))
}
