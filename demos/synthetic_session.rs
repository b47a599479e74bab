use cameo::backend::synthetic::{SyntheticCamera, SyntheticDisplay};
use cameo::common::keys;
use cameo::{Cameo, CameoConfig, Result, TestPattern};

/// Headless run of the full loop against the synthetic backend:
/// start recording, take a screenshot halfway, stop, quit.
fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let out_dir = std::env::temp_dir().join("cameo-demo");
    std::fs::create_dir_all(&out_dir)?;

    let config = CameoConfig {
        screenshot_path: out_dir.join("screenshot.png"),
        video_path: out_dir.join("screencast.avi"),
        ..Default::default()
    };

    let camera = SyntheticCamera::new(320, 240)
        .with_pattern(TestPattern::Checkerboard)
        .with_persisted_images(true);
    let capture_log = camera.log();

    let display = SyntheticDisplay::new()
        .with_keys([i32::from(keys::TAB)])
        .with_idle(24)
        .with_keys([i32::from(keys::SPACE)])
        .with_idle(10)
        .with_keys([i32::from(keys::TAB), i32::from(keys::ESCAPE)]);

    let mut app = Cameo::new(config, camera, display)?;
    let stats = app.run()?;

    println!("frames: {}", stats.frames_elapsed);
    println!("estimated fps: {:?}", stats.estimated_fps);
    for (path, frame_id) in capture_log.images() {
        println!("screenshot of frame {frame_id} at {}", path.display());
    }
    for writer in capture_log.writers() {
        println!(
            "video {} ({} @ {:.1} fps, {}): {} frames",
            writer.path.display(),
            writer.spec.fourcc,
            writer.fps,
            writer.size,
            writer.frames.len()
        );
    }
    Ok(())
}
