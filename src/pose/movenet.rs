use super::smoothing::{LandmarkSmoother, DEFAULT_SMOOTHING_ALPHA};
use super::topology::KEYPOINT_COUNT;
use super::types::{Landmark, Pose, PoseDetector, PoseResult};
use crate::frame::{Frame, PixelFormat};
use anyhow::{bail, Context, Result};
use image::imageops;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

/// Input edge of MoveNet Lightning
pub const DEFAULT_INPUT_SIZE: u32 = 192;

/// Detector settings fixed for the session
#[derive(Debug, Clone, PartialEq)]
pub struct MoveNetConfig {
    /// Square model input edge (192 for Lightning, 256 for Thunder)
    pub input_size: u32,
    /// Minimum mean keypoint score to report a pose
    pub min_detection_confidence: f32,
    /// Minimum mean keypoint score to keep smoothing against the last pose
    pub min_tracking_confidence: f32,
    /// Blend landmarks across frames
    pub smooth_landmarks: bool,
}

impl Default for MoveNetConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            smooth_landmarks: true,
        }
    }
}

/// Single-person MoveNet pose model
///
/// Expects the int32 NHWC variant: input `[1, S, S, 3]` RGB, output
/// `[1, 1, 17, 3]` holding `(y, x, score)` per keypoint, normalized.
pub struct MoveNetDetector {
    session: Option<Session>,
    config: MoveNetConfig,
    smoother: Option<LandmarkSmoother>,
}

impl MoveNetDetector {
    pub fn new<P: AsRef<Path>>(model_path: P, config: MoveNetConfig) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading MoveNet model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!(
            "MoveNet model loaded (input {}x{}, detection>={}, tracking>={})",
            config.input_size,
            config.input_size,
            config.min_detection_confidence,
            config.min_tracking_confidence
        );

        let smoother = config
            .smooth_landmarks
            .then(|| LandmarkSmoother::new(DEFAULT_SMOOTHING_ALPHA, config.min_tracking_confidence));

        Ok(Self {
            session: Some(session),
            config,
            smoother,
        })
    }
}

impl PoseDetector for MoveNetDetector {
    fn detect(&mut self, rgb: &Frame) -> Result<PoseResult> {
        let _span = tracing::debug_span!("movenet_detect").entered();

        let Some(session) = self.session.as_mut() else {
            bail!("MoveNet detector is closed");
        };

        let input = preprocess(rgb, self.config.input_size)?;
        let input = Tensor::from_array(input)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let pose = decode_keypoints(&shape, data)?;

        if pose.score() < self.config.min_detection_confidence {
            tracing::debug!("No pose: mean keypoint score {:.2}", pose.score());
            if let Some(smoother) = self.smoother.as_mut() {
                smoother.reset();
            }
            return Ok(None);
        }

        let pose = match self.smoother.as_mut() {
            Some(smoother) => smoother.apply(pose),
            None => pose,
        };
        Ok(Some(pose))
    }

    fn close(&mut self) -> Result<()> {
        if self.session.take().is_some() {
            tracing::info!("MoveNet session closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "movenet"
    }
}

/// Resize an RGB frame to the square model input as an int32 NHWC tensor.
///
/// The whole frame is stretched rather than letterboxed, so normalized model
/// coordinates map straight back onto the original frame.
pub fn preprocess(rgb: &Frame, input_size: u32) -> Result<Array4<i32>> {
    let _span = tracing::debug_span!("preprocess").entered();

    if rgb.format != PixelFormat::Rgb8 {
        bail!("pose detector expects an RGB frame, got {:?}", rgb.format);
    }
    if input_size == 0 {
        bail!("model input size must be positive");
    }
    let image = rgb.to_rgb_image()?;

    let resized = if image.dimensions() != (input_size, input_size) {
        imageops::resize(&image, input_size, input_size, imageops::FilterType::Triangle)
    } else {
        image
    };

    let size = input_size as usize;
    let mut tensor = Array4::<i32>::zeros((1, size, size, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as i32;
        }
    }

    Ok(tensor)
}

/// Turn the flat `(y, x, score)` model output into landmarks.
pub fn decode_keypoints(shape: &[usize], data: &[f32]) -> Result<Pose> {
    let expected = KEYPOINT_COUNT * 3;
    let trailing: usize = shape.iter().rev().take(2).product();
    if trailing != expected || data.len() < expected {
        bail!(
            "unexpected MoveNet output shape {:?} ({} values)",
            shape,
            data.len()
        );
    }

    let landmarks = data[..expected]
        .chunks_exact(3)
        .map(|kp| Landmark::new(kp[1], kp[0], kp[2]))
        .collect();
    Ok(Pose::new(landmarks))
}
