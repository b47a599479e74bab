//! Frame session manager: two-phase frame lifecycle over a [`CaptureBackend`].
//!
//! Each loop iteration calls [`FrameSession::enter_frame`], optionally reads
//! [`FrameSession::frame`], then calls [`FrameSession::exit_frame`]. Entering only grabs;
//! the frame is decoded the first time it is read (or by `exit_frame`), at most once.
//! Exiting pushes the frame to the preview, writes a pending screenshot and feeds the
//! recording, then releases the frame.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::CaptureBackend;
use crate::common::FrameSize;
use crate::error::Result;
use crate::frame::Frame;
use crate::video_encoder::{EncodingSpec, VideoSink};

/// Frames that must elapse before an estimated frame rate is trusted for encoding.
pub const FPS_WARMUP_FRAMES: u64 = 20;

/// Something that can display preview frames.
pub trait PreviewSink {
    fn show_preview(&mut self, frame: &Frame) -> Result<()>;
}

impl<T: PreviewSink + ?Sized> PreviewSink for Box<T> {
    fn show_preview(&mut self, frame: &Frame) -> Result<()> {
        (**self).show_preview(frame)
    }
}

/// Rolling frame-rate estimate over the whole session.
#[derive(Debug, Clone, Default)]
pub struct FpsEstimator {
    frames_elapsed: u64,
    started_at: Option<Instant>,
    estimate: Option<f64>,
}

impl FpsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one displayed frame at `now`. The first frame starts the clock.
    pub fn observe(&mut self, now: Instant) {
        match self.started_at {
            None => self.started_at = Some(now),
            Some(start) => {
                let secs = now.saturating_duration_since(start).as_secs_f64();
                if secs > 0.0 {
                    self.estimate = Some(self.frames_elapsed as f64 / secs);
                }
            }
        }
        self.frames_elapsed += 1;
    }

    pub fn frames_elapsed(&self) -> u64 {
        self.frames_elapsed
    }

    pub fn estimate(&self) -> Option<f64> {
        self.estimate
    }

    /// The estimate, once [`FPS_WARMUP_FRAMES`] frames have elapsed and it is usable.
    pub fn warmed_up_estimate(&self) -> Option<f64> {
        if self.frames_elapsed < FPS_WARMUP_FRAMES {
            return None;
        }
        self.estimate.filter(|fps| fps.is_finite() && *fps > 0.0)
    }
}

enum FrameSlot {
    Idle,
    Grabbed,
    Retrieved(Option<Frame>),
}

enum Recording<W> {
    Idle,
    Pending {
        path: PathBuf,
        spec: EncodingSpec,
    },
    Active {
        path: PathBuf,
        spec: EncodingSpec,
        fps: f64,
        size: FrameSize,
        writer: W,
    },
    Failed {
        path: PathBuf,
        spec: EncodingSpec,
    },
}

/// Public view of the recording sub-state.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingState {
    Idle,
    /// Recording requested, writer not built yet (waiting for a frame rate).
    Pending { path: PathBuf, spec: EncodingSpec },
    Active {
        path: PathBuf,
        spec: EncodingSpec,
        fps: f64,
        size: FrameSize,
    },
    /// Writer construction or a write failed; nothing is written until the next start.
    Failed { path: PathBuf, spec: EncodingSpec },
}

/// What the video-write step did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    NotRecording,
    /// Frame rate unknown and warm-up not over: frame dropped.
    WarmingUp,
    Written,
    /// Frame geometry differs from the open writer: frame dropped.
    SizeMismatch,
    Disabled,
}

/// Result of one [`FrameSession::exit_frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_id: Option<u64>,
    /// Path of the screenshot written during this exit, if any.
    pub screenshot: Option<PathBuf>,
    pub video: VideoOutcome,
}

impl FrameReport {
    fn skipped() -> Self {
        Self {
            frame_id: None,
            screenshot: None,
            video: VideoOutcome::NotRecording,
        }
    }

    pub fn frame_available(&self) -> bool {
        self.frame_id.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub frames_elapsed: u64,
    pub estimated_fps: Option<f64>,
    pub decode_failures: u64,
    pub screenshots_written: u64,
    pub video_writers_opened: u64,
    pub video_frames_written: u64,
    pub warmup_frames_dropped: u64,
}

pub struct FrameSession<B: CaptureBackend> {
    backend: B,
    channel: u32,
    mirror_preview: bool,
    slot: FrameSlot,
    pending_screenshot: Option<PathBuf>,
    recording: Recording<B::Writer>,
    fps: FpsEstimator,
    stats: SessionStats,
}

impl<B: CaptureBackend> FrameSession<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            channel: 0,
            mirror_preview: false,
            slot: FrameSlot::Idle,
            pending_screenshot: None,
            recording: Recording::Idle,
            fps: FpsEstimator::new(),
            stats: SessionStats::default(),
        }
    }

    /// Show the preview flipped horizontally (selfie view). Files are never mirrored.
    pub fn with_mirrored_preview(mut self, mirror: bool) -> Self {
        self.mirror_preview = mirror;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Select the retrieve channel. A frame already decoded from the old channel is
    /// discarded and decoded again from the new one on the next read.
    pub fn set_channel(&mut self, channel: u32) {
        if self.channel != channel {
            self.channel = channel;
            if let FrameSlot::Retrieved(_) = self.slot {
                self.slot = FrameSlot::Grabbed;
            }
        }
    }

    pub fn is_frame_entered(&self) -> bool {
        !matches!(self.slot, FrameSlot::Idle)
    }

    /// Grab the next frame without decoding it.
    ///
    /// # Panics
    ///
    /// If the previous entered frame was never exited.
    pub fn enter_frame(&mut self) -> Result<()> {
        assert!(
            !self.is_frame_entered(),
            "previous enter_frame() had no matching exit_frame()"
        );
        if self.backend.grab()? {
            self.slot = FrameSlot::Grabbed;
        } else {
            debug!("grab returned no frame");
        }
        Ok(())
    }

    /// The current frame, decoded on first access after [`enter_frame`](Self::enter_frame).
    pub fn frame(&mut self) -> Option<&Frame> {
        if let FrameSlot::Grabbed = self.slot {
            let decoded = match self.backend.retrieve(self.channel) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(channel = self.channel, "retrieve failed: {e}");
                    None
                }
            };
            self.slot = FrameSlot::Retrieved(decoded);
        }
        match &self.slot {
            FrameSlot::Retrieved(Some(frame)) => Some(frame),
            _ => None,
        }
    }

    /// Publish and release the current frame.
    ///
    /// Without a decodable frame this only clears the entered state. Otherwise it updates
    /// the frame-rate estimate, shows the frame on `preview`, writes a pending screenshot
    /// and feeds the recording. Failures in those steps are logged and never abort the
    /// cycle; the frame is released in every case.
    pub fn exit_frame(&mut self, preview: Option<&mut dyn PreviewSink>) -> FrameReport {
        let entered = self.is_frame_entered();
        self.frame();
        let frame = match std::mem::replace(&mut self.slot, FrameSlot::Idle) {
            FrameSlot::Retrieved(Some(frame)) => frame,
            _ => {
                if entered {
                    self.stats.decode_failures += 1;
                    debug!("no decodable frame, skipping cycle");
                }
                return FrameReport::skipped();
            }
        };

        self.fps.observe(Instant::now());

        if let Some(sink) = preview {
            self.push_preview(sink, &frame);
        }
        let screenshot = self.write_pending_screenshot(&frame);
        let video = self.write_video_frame(&frame);

        FrameReport {
            frame_id: Some(frame.frame_id),
            screenshot,
            video,
        }
    }

    /// Write the next exited frame to `path`. Exactly one frame is written per request.
    pub fn request_screenshot(&mut self, path: impl Into<PathBuf>) {
        self.pending_screenshot = Some(path.into());
    }

    pub fn is_writing_image(&self) -> bool {
        self.pending_screenshot.is_some()
    }

    /// Start recording exited frames. Any current recording is closed first; the writer
    /// for the new one is built once its frame rate and size are known.
    pub fn start_recording(&mut self, path: impl Into<PathBuf>, spec: EncodingSpec) {
        self.release_writer();
        let path = path.into();
        info!(path = %path.display(), fourcc = %spec.fourcc, "recording requested");
        self.recording = Recording::Pending { path, spec };
    }

    pub fn stop_recording(&mut self) {
        self.release_writer();
        self.recording = Recording::Idle;
    }

    /// True from `start_recording` until `stop_recording`, including while failed.
    pub fn is_writing_video(&self) -> bool {
        !matches!(self.recording, Recording::Idle)
    }

    pub fn recording_state(&self) -> RecordingState {
        match &self.recording {
            Recording::Idle => RecordingState::Idle,
            Recording::Pending { path, spec } => RecordingState::Pending {
                path: path.clone(),
                spec: *spec,
            },
            Recording::Active {
                path,
                spec,
                fps,
                size,
                ..
            } => RecordingState::Active {
                path: path.clone(),
                spec: *spec,
                fps: *fps,
                size: *size,
            },
            Recording::Failed { path, spec } => RecordingState::Failed {
                path: path.clone(),
                spec: *spec,
            },
        }
    }

    pub fn frames_elapsed(&self) -> u64 {
        self.fps.frames_elapsed()
    }

    pub fn estimated_fps(&self) -> Option<f64> {
        self.fps.estimate()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_elapsed: self.fps.frames_elapsed(),
            estimated_fps: self.fps.estimate(),
            ..self.stats.clone()
        }
    }

    fn push_preview(&self, sink: &mut dyn PreviewSink, frame: &Frame) {
        let shown = if self.mirror_preview {
            frame.mirrored().and_then(|mirrored| sink.show_preview(&mirrored))
        } else {
            sink.show_preview(frame)
        };
        if let Err(e) = shown {
            warn!(frame = frame.frame_id, "preview failed: {e}");
        }
    }

    fn write_pending_screenshot(&mut self, frame: &Frame) -> Option<PathBuf> {
        let path = self.pending_screenshot.take()?;
        match self.backend.write_image(&path, frame) {
            Ok(()) => {
                self.stats.screenshots_written += 1;
                info!(path = %path.display(), frame = frame.frame_id, "screenshot written");
                Some(path)
            }
            Err(e) => {
                error!(path = %path.display(), "screenshot failed: {e}");
                None
            }
        }
    }

    fn resolve_fps(&self) -> Option<f64> {
        self.backend
            .reported_fps()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .or_else(|| self.fps.warmed_up_estimate())
    }

    fn write_video_frame(&mut self, frame: &Frame) -> VideoOutcome {
        let (next, outcome) = match std::mem::replace(&mut self.recording, Recording::Idle) {
            Recording::Idle => (Recording::Idle, VideoOutcome::NotRecording),
            failed @ Recording::Failed { .. } => (failed, VideoOutcome::Disabled),
            Recording::Pending { path, spec } => match self.resolve_fps() {
                None => {
                    self.stats.warmup_frames_dropped += 1;
                    debug!(
                        frames = self.fps.frames_elapsed(),
                        "frame rate unknown, dropping frame during warm-up"
                    );
                    (Recording::Pending { path, spec }, VideoOutcome::WarmingUp)
                }
                Some(fps) => self.open_writer(path, spec, fps, frame),
            },
            Recording::Active {
                path,
                spec,
                fps,
                size,
                writer,
            } => self.write_through(path, spec, fps, size, writer, frame),
        };
        self.recording = next;
        outcome
    }

    fn open_writer(
        &mut self,
        path: PathBuf,
        spec: EncodingSpec,
        fps: f64,
        frame: &Frame,
    ) -> (Recording<B::Writer>, VideoOutcome) {
        let size = frame.size();
        match self.backend.open_video_writer(&path, &spec, fps, size) {
            Ok(writer) => {
                self.stats.video_writers_opened += 1;
                info!(
                    path = %path.display(),
                    fourcc = %spec.fourcc,
                    fps,
                    size = %size,
                    "video writer opened"
                );
                self.write_through(path, spec, fps, size, writer, frame)
            }
            Err(e) => {
                error!(path = %path.display(), "cannot open video writer, recording disabled: {e}");
                (Recording::Failed { path, spec }, VideoOutcome::Disabled)
            }
        }
    }

    fn write_through(
        &mut self,
        path: PathBuf,
        spec: EncodingSpec,
        fps: f64,
        size: FrameSize,
        mut writer: B::Writer,
        frame: &Frame,
    ) -> (Recording<B::Writer>, VideoOutcome) {
        if frame.size() != size {
            warn!(expected = %size, got = %frame.size(), "frame size changed while recording, frame dropped");
            let active = Recording::Active {
                path,
                spec,
                fps,
                size,
                writer,
            };
            return (active, VideoOutcome::SizeMismatch);
        }
        match writer.write_frame(frame) {
            Ok(()) => {
                self.stats.video_frames_written += 1;
                let active = Recording::Active {
                    path,
                    spec,
                    fps,
                    size,
                    writer,
                };
                (active, VideoOutcome::Written)
            }
            Err(e) => {
                error!(path = %path.display(), "video write failed, recording disabled: {e}");
                close_writer(&path, &mut writer);
                (Recording::Failed { path, spec }, VideoOutcome::Disabled)
            }
        }
    }

    fn release_writer(&mut self) {
        if let Recording::Active { path, writer, .. } = &mut self.recording {
            close_writer(path.as_path(), writer);
            info!(path = %path.display(), "video writer closed");
        }
    }
}

impl<B: CaptureBackend> Drop for FrameSession<B> {
    fn drop(&mut self) {
        self.release_writer();
    }
}

fn close_writer<W: VideoSink>(path: &Path, writer: &mut W) {
    if let Err(e) = writer.release() {
        warn!(path = %path.display(), "failed to release video writer: {e}");
    }
}
