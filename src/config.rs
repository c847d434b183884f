//! Session-constant configuration, loadable from YAML.

use crate::error::ConfigError;
use crate::pose::{MoveNetConfig, DEFAULT_INPUT_SIZE};
use crate::stylize::DEFAULT_KERNEL_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial of the camera to bind; first device when unset or absent
    pub device_serial: Option<String>,

    pub pipeline: PipelineConfig,

    pub detector: DetectorConfig,

    pub output: OutputConfig,

    #[serde(rename = "loop")]
    pub frame_loop: LoopConfig,
}

/// Stylization and detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Smoothing kernel size; larger is flatter and slower
    pub kernel_size: u32,

    /// Line art only, no colors
    pub sketch_mode: bool,

    pub min_detection_confidence: f32,

    pub min_tracking_confidence: f32,
}

/// Pose model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// MoveNet ONNX model; pose detection is off without one
    pub model: Option<PathBuf>,

    pub input_size: u32,

    pub smooth_landmarks: bool,
}

/// v4l2loopback output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub device: PathBuf,

    pub width: u32,

    pub height: u32,
}

/// Frame loop pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub target_fps: u32,

    /// Sleep after a poll without a color frame
    pub backoff_ms: u64,

    /// Give up after this long without a color frame; 0 waits forever
    pub starvation_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kernel_size: DEFAULT_KERNEL_SIZE,
            sketch_mode: false,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: None,
            input_size: DEFAULT_INPUT_SIZE,
            smooth_landmarks: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video10"),
            width: 1280,
            height: 720,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            backoff_ms: 10,
            starvation_timeout_ms: 10_000,
        }
    }
}

impl LoopConfig {
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.target_fps.max(1) as f32)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// `None` when starvation never ends the loop
    pub fn starvation_timeout(&self) -> Option<Duration> {
        (self.starvation_timeout_ms > 0).then(|| Duration::from_millis(self.starvation_timeout_ms))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Detector settings derived from the pipeline thresholds
    pub fn movenet(&self) -> MoveNetConfig {
        MoveNetConfig {
            input_size: self.detector.input_size,
            min_detection_confidence: self.pipeline.min_detection_confidence,
            min_tracking_confidence: self.pipeline.min_tracking_confidence,
            smooth_landmarks: self.detector.smooth_landmarks,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.kernel_size == 0 {
            return Err(ConfigError::Invalid(
                "Kernel size must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pipeline.min_detection_confidence) {
            return Err(ConfigError::Invalid(
                "Minimum detection confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pipeline.min_tracking_confidence) {
            return Err(ConfigError::Invalid(
                "Minimum tracking confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detector.input_size == 0 {
            return Err(ConfigError::Invalid(
                "Model input size must be greater than 0".to_string(),
            ));
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(ConfigError::Invalid(
                "Output resolution must be non-zero".to_string(),
            ));
        }
        if self.frame_loop.target_fps == 0 {
            return Err(ConfigError::Invalid("Target FPS must be greater than 0".to_string()));
        }
        if let Some(model) = &self.detector.model {
            if !model.exists() {
                return Err(ConfigError::Invalid(format!(
                    "Pose model not found: {}",
                    model.display()
                )));
            }
        }
        Ok(())
    }
}
