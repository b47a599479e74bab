//! # cameo
//!
//! Live webcam preview. Space saves a screenshot, tab starts/stops recording, escape quits.

use std::path::PathBuf;

use anyhow::Context;
use cameo::backend::opencv::{OpenCvCapture, OpenCvDisplay};
use cameo::{Cameo, CameoConfig, EncodingSpec, Fourcc};
use clap::{Arg, ArgAction, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let command = Command::new("cameo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Webcam preview with screenshots and screencast recording")
        .arg(
            Arg::new("device")
                .short('d')
                .long("device")
                .value_name("INDEX")
                .help("Capture device index")
                .value_parser(clap::value_parser!(i32))
                .default_value("0"),
        )
        .arg(
            Arg::new("window-name")
                .long("window-name")
                .value_name("NAME")
                .help("Preview window title")
                .default_value("Cameo"),
        )
        .arg(
            Arg::new("screenshot")
                .long("screenshot")
                .value_name("PATH")
                .help("Where space writes the screenshot")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("screenshot.png"),
        )
        .arg(
            Arg::new("video")
                .long("video")
                .value_name("PATH")
                .help("Where tab records the screencast")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("screencast.avi"),
        )
        .arg(
            Arg::new("fourcc")
                .long("fourcc")
                .value_name("CODE")
                .help("Four-character video codec code")
                .default_value("I420"),
        )
        .arg(
            Arg::new("no-mirror")
                .long("no-mirror")
                .help("Show the preview unmirrored")
                .action(ArgAction::SetTrue),
        );

    #[cfg(feature = "rerun")]
    let command = command
        .arg(
            Arg::new("rerun")
                .long("rerun")
                .help("Also stream the preview to a native Rerun viewer")
                .action(ArgAction::SetTrue)
                .conflicts_with("rerun-save"),
        )
        .arg(
            Arg::new("rerun-save")
                .long("rerun-save")
                .value_name("FILE")
                .help("Also record the preview into a Rerun .rrd file"),
        );

    command
}

fn config_from_args(matches: &clap::ArgMatches) -> anyhow::Result<CameoConfig> {
    let fourcc: Fourcc = matches
        .get_one::<String>("fourcc")
        .map(String::as_str)
        .unwrap_or("I420")
        .parse()?;
    let defaults = CameoConfig::default();
    let config = CameoConfig {
        device_index: matches
            .get_one::<i32>("device")
            .copied()
            .unwrap_or(defaults.device_index),
        window_name: matches
            .get_one::<String>("window-name")
            .cloned()
            .unwrap_or(defaults.window_name),
        screenshot_path: matches
            .get_one::<PathBuf>("screenshot")
            .cloned()
            .unwrap_or(defaults.screenshot_path),
        video_path: matches
            .get_one::<PathBuf>("video")
            .cloned()
            .unwrap_or(defaults.video_path),
        encoding: EncodingSpec::new(fourcc),
        mirror_preview: !matches.get_flag("no-mirror"),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();
    let config = config_from_args(&matches)?;
    info!(config = %config.to_json()?, "starting");

    let capture = OpenCvCapture::open(config.device_index)
        .with_context(|| format!("opening capture device {}", config.device_index))?;
    let app = Cameo::new(config, capture, OpenCvDisplay::new())?;

    #[cfg(feature = "rerun")]
    let app = {
        use cameo::visualization::RerunPreview;
        if matches.get_flag("rerun") {
            app.with_extra_preview(Box::new(RerunPreview::spawn("cameo", "camera/preview")?))
        } else if let Some(file) = matches.get_one::<String>("rerun-save") {
            app.with_extra_preview(Box::new(RerunPreview::save("cameo", "camera/preview", file)?))
        } else {
            app
        }
    };

    let mut app = app;
    let stats = app.run()?;
    info!(
        frames = stats.frames_elapsed,
        screenshots = stats.screenshots_written,
        video_frames = stats.video_frames_written,
        "bye"
    );
    Ok(())
}
