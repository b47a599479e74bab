use std::time::Duration;

use tracing::{debug, warn};

use crate::backend::DisplayBackend;
use crate::capture::PreviewSink;
use crate::common::keys;
use crate::error::Result;
use crate::frame::Frame;

/// How long a key poll may block. This is also the only point where the window renders.
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Owns one named window on a [`DisplayBackend`].
pub struct WindowController<D: DisplayBackend> {
    backend: D,
    name: String,
    created: bool,
}

impl<D: DisplayBackend> WindowController<D> {
    pub fn new(name: impl Into<String>, backend: D) -> Self {
        Self {
            backend,
            name: name.into(),
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_window_created(&self) -> bool {
        self.created
    }

    pub fn backend(&self) -> &D {
        &self.backend
    }

    /// Open the window. Calling this on an already created window is a caller error.
    pub fn create_window(&mut self) -> Result<()> {
        self.backend.create_window(&self.name)?;
        self.created = true;
        debug!(window = %self.name, "window created");
        Ok(())
    }

    /// Render `frame`. The window must have been created.
    pub fn show(&mut self, frame: &Frame) -> Result<()> {
        self.backend.show(&self.name, frame)
    }

    /// Tear the window down. The controller counts as closed even if the backend fails.
    pub fn destroy_window(&mut self) -> Result<()> {
        self.created = false;
        debug!(window = %self.name, "window destroyed");
        self.backend.destroy_window(&self.name)
    }

    /// Poll for at most one key press. Returns its lowest 8 bits.
    pub fn poll_key(&mut self) -> Result<Option<u8>> {
        let code = self.backend.wait_key(KEY_POLL_INTERVAL)?;
        if code == keys::NO_KEY {
            return Ok(None);
        }
        Ok(Some((code & 0xFF) as u8))
    }

    /// Poll for one key press and hand it to `on_key`.
    pub fn poll_and_dispatch(&mut self, mut on_key: impl FnMut(u8)) -> Result<()> {
        if let Some(code) = self.poll_key()? {
            on_key(code);
        }
        Ok(())
    }
}

impl<D: DisplayBackend> PreviewSink for WindowController<D> {
    fn show_preview(&mut self, frame: &Frame) -> Result<()> {
        self.show(frame)
    }
}

impl<D: DisplayBackend> Drop for WindowController<D> {
    fn drop(&mut self) {
        if self.created {
            if let Err(e) = self.destroy_window() {
                warn!(window = %self.name, "failed to destroy window: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::synthetic::{SyntheticDisplay, WindowEvent};

    #[test]
    fn test_create_and_destroy() {
        let display = SyntheticDisplay::new();
        let log = display.log();
        let mut window = WindowController::new("Cameo", display);

        assert!(!window.is_window_created());
        window.create_window().unwrap();
        assert!(window.is_window_created());
        window.destroy_window().unwrap();
        assert!(!window.is_window_created());

        assert_eq!(
            log.events(),
            vec![
                WindowEvent::Created("Cameo".into()),
                WindowEvent::Destroyed("Cameo".into())
            ]
        );
    }

    #[test]
    fn test_drop_destroys_created_window() {
        let display = SyntheticDisplay::new();
        let log = display.log();
        {
            let mut window = WindowController::new("preview", display);
            window.create_window().unwrap();
        }
        assert_eq!(log.events().last(), Some(&WindowEvent::Destroyed("preview".into())));
    }

    #[test]
    fn test_poll_masks_to_low_byte() {
        let display = SyntheticDisplay::new().with_keys([0x10_0020, keys::NO_KEY, 27]);
        let mut window = WindowController::new("w", display);

        assert_eq!(window.poll_key().unwrap(), Some(32));
        assert_eq!(window.poll_key().unwrap(), None);
        assert_eq!(window.poll_key().unwrap(), Some(27));
        // Script exhausted.
        assert_eq!(window.poll_key().unwrap(), None);
    }

    #[test]
    fn test_poll_uses_short_timeout() {
        let display = SyntheticDisplay::new();
        let log = display.log();
        let mut window = WindowController::new("w", display);
        window.poll_key().unwrap();
        assert_eq!(log.key_waits(), vec![KEY_POLL_INTERVAL]);
    }

    #[test]
    fn test_dispatch_only_on_key() {
        let display = SyntheticDisplay::new().with_keys([keys::NO_KEY, 9]);
        let mut window = WindowController::new("w", display);
        let mut seen = Vec::new();

        window.poll_and_dispatch(|k| seen.push(k)).unwrap();
        assert!(seen.is_empty());
        window.poll_and_dispatch(|k| seen.push(k)).unwrap();
        assert_eq!(seen, vec![9]);
    }
}
