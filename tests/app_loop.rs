use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use cameo::backend::synthetic::{SyntheticCamera, SyntheticDisplay, WindowEvent};
use cameo::common::keys;
use cameo::window::KEY_POLL_INTERVAL;
use cameo::{
    Cameo, CameoConfig, CameoError, Command, Frame, PreviewSink, RecordingState, Result,
    TestPattern, VideoOutcome,
};

fn config() -> CameoConfig {
    CameoConfig {
        window_name: "Test".to_string(),
        screenshot_path: PathBuf::from("out/shot.png"),
        video_path: PathBuf::from("out/cast.avi"),
        mirror_preview: false,
        ..Default::default()
    }
}

fn key(code: u8) -> i32 {
    i32::from(code)
}

#[test]
fn test_escape_ends_run_and_destroys_window() {
    let camera = SyntheticCamera::new(32, 24);
    let capture_log = camera.log();
    let display = SyntheticDisplay::new()
        .with_idle(2)
        .with_keys([key(keys::ESCAPE)]);
    let display_log = display.log();

    let mut app = Cameo::new(config(), camera, display).unwrap();
    let stats = app.run().unwrap();

    assert_eq!(stats.frames_elapsed, 3);
    assert_eq!(capture_log.grab_count(), 3);
    assert_eq!(display_log.shown_count(), 3);
    assert!(display_log.shown().iter().all(|(name, _)| name == "Test"));
    assert_eq!(
        display_log.events(),
        vec![
            WindowEvent::Created("Test".to_string()),
            WindowEvent::Destroyed("Test".to_string()),
        ]
    );
    assert!(!app.window().is_window_created());
    assert!(
        display_log
            .key_waits()
            .iter()
            .all(|wait| *wait == KEY_POLL_INTERVAL)
    );
}

#[test]
fn test_space_writes_screenshot_of_next_frame() {
    let camera = SyntheticCamera::new(32, 24);
    let capture_log = camera.log();
    let display = SyntheticDisplay::new()
        .with_keys([key(keys::SPACE)])
        .with_idle(1)
        .with_keys([key(keys::ESCAPE)]);

    let mut app = Cameo::new(config(), camera, display).unwrap();
    let stats = app.run().unwrap();

    assert_eq!(capture_log.images(), vec![(PathBuf::from("out/shot.png"), 1)]);
    assert_eq!(stats.screenshots_written, 1);
}

#[test]
fn test_tab_toggles_recording() {
    let camera = SyntheticCamera::new(32, 24).with_reported_fps(Some(30.0));
    let capture_log = camera.log();
    let display = SyntheticDisplay::new()
        .with_keys([key(keys::TAB)])
        .with_idle(3)
        .with_keys([key(keys::TAB)])
        .with_idle(2)
        .with_keys([key(keys::ESCAPE)]);

    let mut app = Cameo::new(config(), camera, display).unwrap();
    app.run().unwrap();

    let writers = capture_log.writers();
    assert_eq!(writers.len(), 1);
    assert_eq!(writers[0].path, PathBuf::from("out/cast.avi"));
    assert_eq!(writers[0].spec, config().encoding);
    // Frames 1..=4 are exited between the two presses.
    assert_eq!(writers[0].frames, vec![1, 2, 3, 4]);
    assert!(writers[0].released && writers[0].dropped);
    assert!(!app.session().is_writing_video());
}

#[test]
fn test_handle_commands_directly() {
    let display = SyntheticDisplay::new();
    let mut app = Cameo::new(config(), SyntheticCamera::new(16, 16), display).unwrap();

    app.handle(Command::Screenshot);
    assert!(app.session().is_writing_image());

    app.handle(Command::ToggleRecording);
    assert_eq!(
        app.session().recording_state(),
        RecordingState::Pending {
            path: PathBuf::from("out/cast.avi"),
            spec: config().encoding,
        }
    );
    app.handle(Command::ToggleRecording);
    assert_eq!(app.session().recording_state(), RecordingState::Idle);
}

#[test]
fn test_unmapped_keys_change_nothing() {
    let display = SyntheticDisplay::new();
    let display_log = display.log();
    let mut app = Cameo::new(config(), SyntheticCamera::new(16, 16), display).unwrap();
    app.window_mut().create_window().unwrap();

    for code in 0..=u8::MAX {
        if [keys::SPACE, keys::TAB, keys::ESCAPE].contains(&code) {
            continue;
        }
        app.on_keypress(code);
        assert!(!app.session().is_writing_image(), "code {code}");
        assert!(!app.session().is_writing_video(), "code {code}");
        assert!(app.window().is_window_created(), "code {code}");
    }
    assert_eq!(display_log.events().len(), 1);
}

#[test]
fn test_key_codes_are_masked_to_low_byte() {
    let camera = SyntheticCamera::new(16, 16);
    let capture_log = camera.log();
    // Extended codes as reported by some window systems: modifier bits above the low byte.
    let display = SyntheticDisplay::new()
        .with_keys([0x10_0000 | key(keys::SPACE), 0x20_0000 | key(keys::ESCAPE)]);

    let mut app = Cameo::new(config(), camera, display).unwrap();
    app.run().unwrap();

    assert_eq!(capture_log.images().len(), 1);
    assert!(!app.window().is_window_created());
}

#[test]
fn test_step_tolerates_camera_faults() {
    let camera = SyntheticCamera::new(16, 16)
        .with_failing_grabs([0])
        .with_undecodable_frames([1]);
    let display = SyntheticDisplay::new()
        .with_keys([key(keys::SPACE), keys::NO_KEY, keys::NO_KEY, key(keys::ESCAPE)]);
    let display_log = display.log();
    let capture_log = camera.log();

    let mut app = Cameo::new(config(), camera, display).unwrap();
    let stats = app.run().unwrap();

    assert_eq!(stats.frames_elapsed, 2);
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(display_log.shown_count(), 2);
    // Requested on the failed grab, served by the first decodable frame.
    assert_eq!(capture_log.images(), vec![(PathBuf::from("out/shot.png"), 2)]);
}

#[test]
fn test_failing_window_does_not_stop_capture() {
    let camera = SyntheticCamera::new(16, 16).with_reported_fps(Some(10.0));
    let capture_log = camera.log();
    let display = SyntheticDisplay::new()
        .with_failing_show(true)
        .with_keys([key(keys::TAB), keys::NO_KEY, key(keys::ESCAPE)]);

    let mut app = Cameo::new(config(), camera, display).unwrap();
    app.run().unwrap();

    assert_eq!(capture_log.writers()[0].frames, vec![1, 2]);
}

#[test]
fn test_mirrored_window_preview() {
    let camera = SyntheticCamera::new(40, 8);
    let capture_log = camera.log();
    let display = SyntheticDisplay::new().with_keys([key(keys::SPACE), key(keys::ESCAPE)]);
    let display_log = display.log();
    let config = CameoConfig {
        mirror_preview: true,
        ..config()
    };

    let mut app = Cameo::new(config, camera, display).unwrap();
    app.run().unwrap();

    let shown = display_log.shown();
    let (_, second) = &shown[1];
    let raw = Frame::test_pattern(40, 8, TestPattern::Gradient, 1);
    assert_eq!(second.data, raw.mirrored().unwrap().data);
    assert_ne!(second.data, raw.data);
    assert_eq!(capture_log.images()[0].1, 1);
}

#[derive(Clone, Default)]
struct Collected(Rc<RefCell<Vec<u64>>>);

impl PreviewSink for Collected {
    fn show_preview(&mut self, frame: &Frame) -> Result<()> {
        self.0.borrow_mut().push(frame.frame_id);
        Ok(())
    }
}

#[test]
fn test_extra_preview_sees_every_frame() {
    let collected = Collected::default();
    let display = SyntheticDisplay::new()
        .with_failing_show(true)
        .with_idle(3)
        .with_keys([key(keys::ESCAPE)]);

    let mut app = Cameo::new(config(), SyntheticCamera::new(16, 16), display)
        .unwrap()
        .with_extra_preview(Box::new(collected.clone()));
    app.run().unwrap();

    assert_eq!(*collected.0.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn test_step_reports_frame() {
    let display = SyntheticDisplay::new();
    let camera = SyntheticCamera::new(16, 16);
    let mut app = Cameo::new(config(), camera, display).unwrap();

    let first = app.step();
    let second = app.step();
    assert_eq!(first.frame_id, Some(0));
    assert_eq!(second.frame_id, Some(1));
    assert_eq!(second.video, VideoOutcome::NotRecording);
    assert!(!app.session().is_frame_entered());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = CameoConfig {
        window_name: "  ".to_string(),
        ..config()
    };
    let result = Cameo::new(config, SyntheticCamera::new(8, 8), SyntheticDisplay::new());
    assert!(matches!(result, Err(CameoError::InvalidConfiguration(_))));
}

#[test]
fn test_dropping_app_releases_resources() {
    let camera = SyntheticCamera::new(16, 16).with_reported_fps(Some(30.0));
    let capture_log = camera.log();
    let display = SyntheticDisplay::new().with_keys([key(keys::TAB)]);
    let display_log = display.log();

    {
        let mut app = Cameo::new(config(), camera, display).unwrap();
        app.window_mut().create_window().unwrap();
        app.step();
        app.step();
        assert!(matches!(
            app.session().recording_state(),
            RecordingState::Active { .. }
        ));
        assert!(!capture_log.writers()[0].released);
    }

    let writers = capture_log.writers();
    assert!(writers[0].released && writers[0].dropped);
    assert_eq!(
        display_log.events().last(),
        Some(&WindowEvent::Destroyed("Test".to_string()))
    );
}
