use anyhow::{Context, Result};
use cartoon_pose::capture::NokhwaCameraProvider;
use cartoon_pose::config::Config;
use cartoon_pose::output::{ExitKeys, LoopbackDisplay};
use cartoon_pose::pipeline::{Pipeline, Session};
use cartoon_pose::pose;
use cartoon_pose::shutdown::ShutdownSignal;
use cartoon_pose::stylize::Cartoonizer;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Serial number of the camera to use (first device if not found)
    #[arg(short = 's', long)]
    device_serial: Option<String>,

    /// Stylization kernel size (larger is flatter and slower)
    #[arg(short, long)]
    kernel_size: Option<u32>,

    /// Draw line art only, without colors
    #[arg(long)]
    sketch: bool,

    /// Minimum mean keypoint score to report a pose
    #[arg(long)]
    min_detection_confidence: Option<f32>,

    /// Minimum mean keypoint score to keep tracking the previous pose
    #[arg(long)]
    min_tracking_confidence: Option<f32>,

    /// Path to MoveNet pose model (ONNX file)
    /// If not provided, runs without pose detection
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Square model input size (192 for Lightning, 256 for Thunder)
    #[arg(long)]
    model_input_size: Option<u32>,

    /// Disable landmark smoothing across frames
    #[arg(long)]
    no_smooth_landmarks: bool,

    /// Output v4l2loopback device path
    #[arg(short, long)]
    output_device: Option<PathBuf>,

    /// Output resolution width
    #[arg(long)]
    output_width: Option<u32>,

    /// Output resolution height
    #[arg(long)]
    output_height: Option<u32>,

    /// Target frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many milliseconds without a color frame (0 waits forever)
    #[arg(long)]
    starvation_timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Flags given on the command line override the config file
    fn apply(&self, config: &mut Config) {
        if let Some(serial) = &self.device_serial {
            config.device_serial = Some(serial.clone());
        }
        if let Some(k) = self.kernel_size {
            config.pipeline.kernel_size = k;
        }
        if self.sketch {
            config.pipeline.sketch_mode = true;
        }
        if let Some(c) = self.min_detection_confidence {
            config.pipeline.min_detection_confidence = c;
        }
        if let Some(c) = self.min_tracking_confidence {
            config.pipeline.min_tracking_confidence = c;
        }
        if let Some(model) = &self.model {
            config.detector.model = Some(model.clone());
        }
        if let Some(size) = self.model_input_size {
            config.detector.input_size = size;
        }
        if self.no_smooth_landmarks {
            config.detector.smooth_landmarks = false;
        }
        if let Some(device) = &self.output_device {
            config.output.device = device.clone();
        }
        if let Some(width) = self.output_width {
            config.output.width = width;
        }
        if let Some(height) = self.output_height {
            config.output.height = height;
        }
        if let Some(fps) = self.fps {
            config.frame_loop.target_fps = fps;
        }
        if let Some(timeout) = self.starvation_timeout_ms {
            config.frame_loop.starvation_timeout_ms = timeout;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Cartoon Pose starting");

    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?
        }
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Kernel size: {}, sketch mode: {}",
        config.pipeline.kernel_size,
        config.pipeline.sketch_mode
    );
    tracing::info!("Target FPS: {}", config.frame_loop.target_fps);

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrlc();

    let session = Session::start(
        &NokhwaCameraProvider,
        config.device_serial.as_deref(),
        || match &config.detector.model {
            Some(model_path) => {
                let detector = pose::create_default_detector(model_path, config.movenet())
                    .context("Failed to load pose model")?;
                Ok(Some(detector))
            }
            None => {
                tracing::info!("Running without pose detection (no model given)");
                Ok(None)
            }
        },
        |_camera| {
            LoopbackDisplay::new(
                &config.output.device,
                config.output.width,
                config.output.height,
                ExitKeys::spawn(),
            )
            .context("Failed to initialize v4l2loopback output")
        },
    )?;

    let cartoonizer = Cartoonizer::new(config.pipeline.kernel_size, config.pipeline.sketch_mode);
    let pipeline = Pipeline::new(session, cartoonizer, config.frame_loop.clone(), shutdown);

    let summary = pipeline.run()?;
    tracing::info!(
        "Presented {} frames ({} acquisition gaps, {} stylization fallbacks)",
        summary.frames_presented,
        summary.acquisition_gaps,
        summary.stylize_fallbacks + summary.conversion_fallbacks
    );

    Ok(())
}
