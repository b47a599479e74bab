//! In-process media backend producing test-pattern frames.
//!
//! Every call is recorded in a shared log (`CaptureLog`, `DisplayLog`) that stays readable
//! after the backend has been moved into a session, and failures can be injected per call.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::backend::{CaptureBackend, DisplayBackend};
use crate::common::{FrameSize, keys};
use crate::error::{CameoError, Result};
use crate::frame::{Frame, TestPattern};
use crate::video_encoder::{EncodingSpec, VideoSink};

/// One video writer opened through a [`SyntheticCamera`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriterRecord {
    pub path: PathBuf,
    pub spec: EncodingSpec,
    pub fps: f64,
    pub size: FrameSize,
    /// IDs of the frames written, in order.
    pub frames: Vec<u64>,
    /// Set by an explicit [`VideoSink::release`].
    pub released: bool,
    /// Set when the writer handle is dropped.
    pub dropped: bool,
}

#[derive(Debug, Default)]
struct CaptureLogInner {
    grabs: u64,
    retrieves: u64,
    retrieve_channels: Vec<u32>,
    images: Vec<(PathBuf, u64)>,
    writers: Vec<WriterRecord>,
}

/// Shared record of everything a [`SyntheticCamera`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct CaptureLog(Rc<RefCell<CaptureLogInner>>);

impl CaptureLog {
    pub fn grab_count(&self) -> u64 {
        self.0.borrow().grabs
    }

    pub fn retrieve_count(&self) -> u64 {
        self.0.borrow().retrieves
    }

    pub fn retrieve_channels(&self) -> Vec<u32> {
        self.0.borrow().retrieve_channels.clone()
    }

    /// Screenshots written, as `(path, frame_id)`.
    pub fn images(&self) -> Vec<(PathBuf, u64)> {
        self.0.borrow().images.clone()
    }

    pub fn writers(&self) -> Vec<WriterRecord> {
        self.0.borrow().writers.clone()
    }

    pub fn video_frames_written(&self) -> usize {
        self.0.borrow().writers.iter().map(|w| w.frames.len()).sum()
    }
}

/// A fake camera. Grab `n` (counting from 0) decodes to a test pattern with `frame_id == n`.
pub struct SyntheticCamera {
    size: FrameSize,
    pattern: TestPattern,
    reported_fps: Option<f64>,
    persist_images: bool,
    next_grab: u64,
    grabbed: Option<u64>,
    undecodable: HashSet<u64>,
    failing_grabs: HashSet<u64>,
    fail_writer_open: bool,
    fail_image_writes: bool,
    writer_write_limit: Option<usize>,
    log: CaptureLog,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: FrameSize::new(width, height),
            pattern: TestPattern::Gradient,
            reported_fps: None,
            persist_images: false,
            next_grab: 0,
            grabbed: None,
            undecodable: HashSet::new(),
            failing_grabs: HashSet::new(),
            fail_writer_open: false,
            fail_image_writes: false,
            writer_write_limit: None,
            log: CaptureLog::default(),
        }
    }

    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Frame rate the device claims. `None` (the default) or `0.0` means unknown.
    pub fn with_reported_fps(mut self, fps: Option<f64>) -> Self {
        self.reported_fps = fps;
        self
    }

    /// Encode screenshots to disk with the `image` crate instead of only logging them.
    pub fn with_persisted_images(mut self, persist: bool) -> Self {
        self.persist_images = persist;
        self
    }

    /// Grabs with these indices succeed but decode to nothing.
    pub fn with_undecodable_frames(mut self, grabs: impl IntoIterator<Item = u64>) -> Self {
        self.undecodable.extend(grabs);
        self
    }

    /// Grabs with these indices return an error.
    pub fn with_failing_grabs(mut self, grabs: impl IntoIterator<Item = u64>) -> Self {
        self.failing_grabs.extend(grabs);
        self
    }

    pub fn with_failing_writer_open(mut self, fail: bool) -> Self {
        self.fail_writer_open = fail;
        self
    }

    pub fn with_failing_image_writes(mut self, fail: bool) -> Self {
        self.fail_image_writes = fail;
        self
    }

    /// Each writer accepts `limit` frames, then every write fails.
    pub fn with_writer_write_limit(mut self, limit: usize) -> Self {
        self.writer_write_limit = Some(limit);
        self
    }

    /// Change the geometry of frames decoded from now on.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = FrameSize::new(width, height);
    }

    pub fn set_fail_writer_open(&mut self, fail: bool) {
        self.fail_writer_open = fail;
    }

    pub fn log(&self) -> CaptureLog {
        self.log.clone()
    }
}

impl CaptureBackend for SyntheticCamera {
    type Writer = SyntheticVideoWriter;

    fn grab(&mut self) -> Result<bool> {
        let index = self.next_grab;
        self.next_grab += 1;
        self.log.0.borrow_mut().grabs += 1;
        if self.failing_grabs.contains(&index) {
            self.grabbed = None;
            return Err(CameoError::backend(format!("synthetic grab {index} failed")));
        }
        self.grabbed = Some(index);
        Ok(true)
    }

    fn retrieve(&mut self, channel: u32) -> Result<Option<Frame>> {
        {
            let mut log = self.log.0.borrow_mut();
            log.retrieves += 1;
            log.retrieve_channels.push(channel);
        }
        let Some(index) = self.grabbed else {
            return Ok(None);
        };
        if self.undecodable.contains(&index) {
            return Ok(None);
        }
        let phase = index + u64::from(channel) * 7;
        let frame = Frame::test_pattern(self.size.width, self.size.height, self.pattern, phase)
            .with_frame_id(index);
        Ok(Some(frame))
    }

    fn reported_fps(&self) -> Option<f64> {
        self.reported_fps
    }

    fn write_image(&mut self, path: &Path, frame: &Frame) -> Result<()> {
        if self.fail_image_writes {
            return Err(CameoError::backend(format!(
                "synthetic image write to {} failed",
                path.display()
            )));
        }
        if self.persist_images {
            frame.to_dynamic_image()?.save(path)?;
        }
        self.log
            .0
            .borrow_mut()
            .images
            .push((path.to_path_buf(), frame.frame_id));
        Ok(())
    }

    fn open_video_writer(
        &mut self,
        path: &Path,
        spec: &EncodingSpec,
        fps: f64,
        size: FrameSize,
    ) -> Result<SyntheticVideoWriter> {
        if self.fail_writer_open {
            return Err(CameoError::video_writer(path, "synthetic writer refused to open"));
        }
        let index = {
            let mut log = self.log.0.borrow_mut();
            log.writers.push(WriterRecord {
                path: path.to_path_buf(),
                spec: *spec,
                fps,
                size,
                frames: Vec::new(),
                released: false,
                dropped: false,
            });
            log.writers.len() - 1
        };
        debug!(index, path = %path.display(), "synthetic writer opened");
        Ok(SyntheticVideoWriter {
            index,
            size,
            is_color: spec.is_color,
            written: 0,
            write_limit: self.writer_write_limit,
            log: self.log.clone(),
        })
    }
}

pub struct SyntheticVideoWriter {
    index: usize,
    size: FrameSize,
    is_color: bool,
    written: usize,
    write_limit: Option<usize>,
    log: CaptureLog,
}

impl SyntheticVideoWriter {
    fn record(&self) -> std::cell::RefMut<'_, WriterRecord> {
        std::cell::RefMut::map(self.log.0.borrow_mut(), |log| &mut log.writers[self.index])
    }
}

impl VideoSink for SyntheticVideoWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.size() != self.size {
            return Err(CameoError::InvalidFrame(format!(
                "writer expects {}, got {}",
                self.size,
                frame.size()
            )));
        }
        if frame.format.is_color() != self.is_color {
            return Err(CameoError::InvalidFrame(format!(
                "{} frame sent to a {} writer",
                frame.format,
                if self.is_color { "color" } else { "grayscale" }
            )));
        }
        if self.write_limit.is_some_and(|limit| self.written >= limit) {
            return Err(CameoError::backend("synthetic writer is full"));
        }
        self.written += 1;
        self.record().frames.push(frame.frame_id);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.record().released = true;
        Ok(())
    }
}

impl Drop for SyntheticVideoWriter {
    fn drop(&mut self) {
        self.record().dropped = true;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    Created(String),
    Destroyed(String),
}

#[derive(Debug, Default)]
struct DisplayLogInner {
    events: Vec<WindowEvent>,
    shown: Vec<(String, Frame)>,
    key_waits: Vec<Duration>,
}

/// Shared record of everything a [`SyntheticDisplay`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct DisplayLog(Rc<RefCell<DisplayLogInner>>);

impl DisplayLog {
    pub fn events(&self) -> Vec<WindowEvent> {
        self.0.borrow().events.clone()
    }

    /// Frames shown, with the window they were shown in.
    pub fn shown(&self) -> Vec<(String, Frame)> {
        self.0.borrow().shown.clone()
    }

    pub fn shown_count(&self) -> usize {
        self.0.borrow().shown.len()
    }

    pub fn key_waits(&self) -> Vec<Duration> {
        self.0.borrow().key_waits.clone()
    }
}

/// A fake window system replaying a scripted sequence of key codes.
#[derive(Default)]
pub struct SyntheticDisplay {
    keys: VecDeque<i32>,
    fail_show: bool,
    log: DisplayLog,
}

impl SyntheticDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw key codes, one per poll. Use [`keys::NO_KEY`] for an idle poll.
    pub fn with_keys(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.keys.extend(codes);
        self
    }

    /// Queue `polls` idle polls.
    pub fn with_idle(mut self, polls: usize) -> Self {
        self.keys.extend(std::iter::repeat_n(keys::NO_KEY, polls));
        self
    }

    pub fn with_failing_show(mut self, fail: bool) -> Self {
        self.fail_show = fail;
        self
    }

    pub fn log(&self) -> DisplayLog {
        self.log.clone()
    }
}

impl DisplayBackend for SyntheticDisplay {
    fn create_window(&mut self, name: &str) -> Result<()> {
        self.log
            .0
            .borrow_mut()
            .events
            .push(WindowEvent::Created(name.to_string()));
        Ok(())
    }

    fn show(&mut self, name: &str, frame: &Frame) -> Result<()> {
        if self.fail_show {
            return Err(CameoError::backend("synthetic show failed"));
        }
        self.log
            .0
            .borrow_mut()
            .shown
            .push((name.to_string(), frame.clone()));
        Ok(())
    }

    fn destroy_window(&mut self, name: &str) -> Result<()> {
        self.log
            .0
            .borrow_mut()
            .events
            .push(WindowEvent::Destroyed(name.to_string()));
        Ok(())
    }

    fn wait_key(&mut self, timeout: Duration) -> Result<i32> {
        self.log.0.borrow_mut().key_waits.push(timeout);
        Ok(self.keys.pop_front().unwrap_or(keys::NO_KEY))
    }
}
