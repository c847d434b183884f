//! Error types for the cartoon pose pipeline.

use thiserror::Error;

/// Failure of a single per-frame stage. Always recoverable: the orchestrator
/// swaps in a fallback frame and keeps running.
#[derive(Error, Debug)]
pub enum StageError {
    /// Frame is empty or its buffer does not match its dimensions
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Color-space conversion for the pose detector failed
    #[error("color conversion failed: {0}")]
    ColorConversion(String),

    /// An image filter could not produce output
    #[error("filter error: {0}")]
    Filter(String),

    /// The pose detector returned an error
    #[error("pose detection failed: {0}")]
    Detection(#[source] anyhow::Error),
}

/// Failure while binding the session. Aborts before the loop starts.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("no camera devices detected")]
    NoDevices,

    #[error("failed to enumerate camera devices: {0:#}")]
    Enumerate(#[source] anyhow::Error),

    #[error("failed to initialize camera {serial}: {source:#}")]
    DeviceInit {
        serial: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to initialize pose detector: {0:#}")]
    Detector(#[source] anyhow::Error),

    #[error("failed to initialize display: {0:#}")]
    Display(#[source] anyhow::Error),
}

/// Failure to draw one overlay element.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrawError {
    #[error("landmark {index} has non-finite coordinates")]
    NonFinite { index: usize },

    #[error("landmark {index} at ({x}, {y}) lies outside the {width}x{height} frame")]
    OutOfBounds {
        index: usize,
        x: f32,
        y: f32,
        width: u32,
        height: u32,
    },
}

/// Invalid configuration value.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Terminal outcome of the frame loop other than a normal exit.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("camera delivered no color frame for {0:?}")]
    CameraStarved(std::time::Duration),
}
