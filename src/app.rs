//! Application loop and keyboard command dispatch.

use tracing::{debug, info, warn};

use crate::backend::{CaptureBackend, DisplayBackend};
use crate::capture::{FrameReport, FrameSession, PreviewSink, SessionStats};
use crate::common::keys;
use crate::config::CameoConfig;
use crate::error::Result;
use crate::frame::Frame;
use crate::window::WindowController;

/// Keyboard commands. The mapping is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Space: write the next frame to the screenshot path.
    Screenshot,
    /// Tab: start recording if idle, stop otherwise.
    ToggleRecording,
    /// Escape: close the window, which ends the run loop.
    Quit,
}

impl Command {
    pub fn from_keycode(code: u8) -> Option<Self> {
        match code {
            keys::SPACE => Some(Self::Screenshot),
            keys::TAB => Some(Self::ToggleRecording),
            keys::ESCAPE => Some(Self::Quit),
            _ => None,
        }
    }
}

pub struct Cameo<C: CaptureBackend, D: DisplayBackend> {
    config: CameoConfig,
    session: FrameSession<C>,
    window: WindowController<D>,
    extra_preview: Option<Box<dyn PreviewSink>>,
}

impl<C: CaptureBackend, D: DisplayBackend> Cameo<C, D> {
    pub fn new(config: CameoConfig, capture: C, display: D) -> Result<Self> {
        config.validate()?;
        let session = FrameSession::new(capture).with_mirrored_preview(config.mirror_preview);
        let window = WindowController::new(config.window_name.clone(), display);
        Ok(Self {
            config,
            session,
            window,
            extra_preview: None,
        })
    }

    /// Also send every preview frame to `sink`.
    pub fn with_extra_preview(mut self, sink: Box<dyn PreviewSink>) -> Self {
        self.extra_preview = Some(sink);
        self
    }

    pub fn config(&self) -> &CameoConfig {
        &self.config
    }

    pub fn session(&self) -> &FrameSession<C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut FrameSession<C> {
        &mut self.session
    }

    pub fn window(&self) -> &WindowController<D> {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut WindowController<D> {
        &mut self.window
    }

    /// Open the window and run until it is closed.
    pub fn run(&mut self) -> Result<SessionStats> {
        self.window.create_window()?;
        info!(
            window = %self.window.name(),
            "running: space = screenshot, tab = start/stop recording, escape = quit"
        );

        while self.window.is_window_created() {
            self.step();
        }

        let stats = self.session.stats();
        match serde_json::to_string(&stats) {
            Ok(json) => info!(stats = %json, "session finished"),
            Err(e) => warn!("failed to serialize session stats: {e}"),
        }
        Ok(stats)
    }

    /// One loop iteration: enter, read, exit, poll input.
    pub fn step(&mut self) -> FrameReport {
        if let Err(e) = self.session.enter_frame() {
            warn!("grab failed: {e}");
        }

        // Per-frame processing hook. Nothing is applied yet.
        let _frame = self.session.frame();

        let report = {
            let mut previews = Previews {
                window: &mut self.window,
                extra: &mut self.extra_preview,
            };
            self.session.exit_frame(Some(&mut previews))
        };

        match self.window.poll_key() {
            Ok(Some(code)) => self.on_keypress(code),
            Ok(None) => {}
            Err(e) => warn!("key poll failed: {e}"),
        }
        report
    }

    pub fn on_keypress(&mut self, code: u8) {
        match Command::from_keycode(code) {
            Some(command) => self.handle(command),
            None => debug!(code, "ignoring key"),
        }
    }

    pub fn handle(&mut self, command: Command) {
        match command {
            Command::Screenshot => {
                self.session
                    .request_screenshot(self.config.screenshot_path.clone());
                info!(path = %self.config.screenshot_path.display(), "screenshot requested");
            }
            Command::ToggleRecording => {
                if self.session.is_writing_video() {
                    self.session.stop_recording();
                    info!("recording stopped");
                } else {
                    self.session
                        .start_recording(self.config.video_path.clone(), self.config.encoding);
                    info!(path = %self.config.video_path.display(), "recording started");
                }
            }
            Command::Quit => {
                if let Err(e) = self.window.destroy_window() {
                    warn!("failed to destroy window: {e}");
                }
                info!("exiting");
            }
        }
    }
}

struct Previews<'a, D: DisplayBackend> {
    window: &'a mut WindowController<D>,
    extra: &'a mut Option<Box<dyn PreviewSink>>,
}

impl<D: DisplayBackend> PreviewSink for Previews<'_, D> {
    fn show_preview(&mut self, frame: &Frame) -> Result<()> {
        let shown = self.window.show_preview(frame);
        if let Some(extra) = self.extra.as_mut() {
            if let Err(e) = extra.show_preview(frame) {
                warn!("extra preview failed: {e}");
            }
        }
        shown
    }
}
