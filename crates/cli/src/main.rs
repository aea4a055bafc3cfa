mod controls;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;

use faceshape_core::capture::infrastructure::ffmpeg_capture::FfmpegCaptureProvider;
use faceshape_core::detection::domain::detector_factory::ModelId;
use faceshape_core::detection::domain::runtime::Backend;
use faceshape_core::detection::infrastructure::onnx_detector_factory::OnnxDetectorFactory;
use faceshape_core::detection::infrastructure::ort_runtime::OrtRuntime;
use faceshape_core::pipeline::diagnostics_sink::DiagnosticsSink;
use faceshape_core::pipeline::frame_loop::FrameLoop;
use faceshape_core::pipeline::infrastructure::json_lines_sink::JsonLinesSink;
use faceshape_core::pipeline::infrastructure::log_diagnostics_sink::LogDiagnosticsSink;
use faceshape_core::pipeline::model_lifecycle::ModelLifecycle;
use faceshape_core::pipeline::settings::Settings;
use faceshape_core::render::domain::frame_renderer::FrameRenderer;
use faceshape_core::render::infrastructure::image_file_writer::ImageFileWriter;
use faceshape_core::render::infrastructure::overlay_renderer::{OverlayRenderer, SnapshotPolicy};
use faceshape_core::shared::constants::DEFAULT_REFRESH_HZ;

/// Live face measurement and face shape classification from a camera feed.
#[derive(Parser)]
#[command(name = "faceshape")]
struct Cli {
    /// Landmark model: face-mesh or face-mesh-refined.
    #[arg(long)]
    model: ModelId,

    /// JSON settings file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device, stream URL or video file.
    #[arg(long)]
    source: Option<String>,

    /// libavdevice input format (v4l2, avfoundation, dshow). Use "none" for files and URLs.
    #[arg(long)]
    input_format: Option<String>,

    /// Requested capture width.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height.
    #[arg(long)]
    height: Option<u32>,

    /// Requested capture frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Inference backend: auto, cpu, coreml, directml.
    #[arg(long)]
    backend: Option<Backend>,

    /// Intra-op threads for inference (0 = runtime default).
    #[arg(long)]
    threads: Option<usize>,

    /// Mirror landmarks horizontally (selfie view).
    #[arg(long)]
    flip: bool,

    /// Do not draw landmark dots.
    #[arg(long)]
    no_mesh: bool,

    /// Do not draw face bounding boxes.
    #[arg(long)]
    no_bounding_box: bool,

    /// Save every Nth rendered frame as PNG into this directory.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Snapshot interval in frames.
    #[arg(long, default_value = "30")]
    snapshot_every: usize,

    /// Print diagnostics as JSON lines on stdout.
    #[arg(long)]
    json: bool,

    /// Frame loop ticks per second.
    #[arg(long, default_value_t = DEFAULT_REFRESH_HZ)]
    refresh_hz: f64,

    /// Directory searched for model files before downloading.
    #[arg(long)]
    bundled_models: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let settings = build_settings(&cli)?;

    let (changes_tx, changes_rx) = crossbeam_channel::unbounded();
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    // End of stdin drops both senders without stopping the frame loop.
    std::thread::Builder::new()
        .name("controls".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            controls::forward_controls(stdin.lock(), &changes_tx, &shutdown_tx);
        })?;

    let factory = OnnxDetectorFactory::new(cli.bundled_models.clone())
        .with_download_progress(download_progress);
    let lifecycle = ModelLifecycle::new(
        Box::new(factory),
        Box::new(OrtRuntime::new()),
        Box::new(FfmpegCaptureProvider::new()),
    );
    let renderer = build_renderer(&cli);
    let sink: Box<dyn DiagnosticsSink> = if cli.json {
        Box::new(JsonLinesSink::new(std::io::stdout()))
    } else {
        Box::new(LogDiagnosticsSink::default())
    };

    log::info!(
        "Starting with model {} on {} ({})",
        settings.model,
        settings.capture.source,
        controls::HELP
    );
    let mut frame_loop = FrameLoop::new(settings, changes_rx, lifecycle, renderer, sink);
    let refresh = crossbeam_channel::tick(Duration::from_secs_f64(1.0 / cli.refresh_hz));
    frame_loop.run(&refresh, &shutdown_rx);
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    settings.model = cli.model;
    if let Some(source) = &cli.source {
        settings.capture.source = source.clone();
    }
    if let Some(format) = &cli.input_format {
        settings.capture.input_format = (format != "none").then(|| format.clone());
    }
    if let Some(width) = cli.width {
        settings.capture.width = width;
    }
    if let Some(height) = cli.height {
        settings.capture.height = height;
    }
    if let Some(fps) = cli.fps {
        settings.capture.target_fps = fps;
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(threads) = cli.threads {
        settings.flags.intra_threads = threads;
    }
    if cli.flip {
        settings.flip_horizontal = true;
    }
    if cli.no_mesh {
        settings.render.show_mesh = false;
    }
    if cli.no_bounding_box {
        settings.render.show_bounding_box = false;
    }
    Ok(settings)
}

fn build_renderer(cli: &Cli) -> Box<dyn FrameRenderer> {
    let renderer = OverlayRenderer::new();
    match &cli.snapshot_dir {
        Some(dir) => Box::new(renderer.with_snapshots(SnapshotPolicy {
            dir: dir.clone(),
            every: cli.snapshot_every,
            writer: Box::new(ImageFileWriter::new()),
        })),
        None => Box::new(renderer),
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(cli.refresh_hz > 0.0 && cli.refresh_hz <= 1000.0) {
        return Err(format!(
            "Refresh rate must be between 0 and 1000 Hz, got {}",
            cli.refresh_hz
        )
        .into());
    }
    if cli.snapshot_every == 0 {
        return Err("Snapshot interval must be at least 1".into());
    }
    if let Some(config) = &cli.config {
        if !config.exists() {
            return Err(format!("Settings file not found: {}", config.display()).into());
        }
    }
    if cli.width.is_some() != cli.height.is_some() {
        return Err("--width and --height must be given together".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
