mod movenet;
mod smoothing;
pub mod topology;
mod types;

pub use movenet::{decode_keypoints, preprocess, MoveNetConfig, MoveNetDetector, DEFAULT_INPUT_SIZE};
pub use smoothing::{LandmarkSmoother, DEFAULT_SMOOTHING_ALPHA};
pub use types::{Landmark, Pose, PoseDetector, PoseResult};

use anyhow::Result;
use std::path::Path;

/// Create the default pose detector (MoveNet)
pub fn create_default_detector<P: AsRef<Path>>(
    model_path: P,
    config: MoveNetConfig,
) -> Result<Box<dyn PoseDetector>> {
    let detector = MoveNetDetector::new(model_path, config)?;
    Ok(Box::new(detector))
}
