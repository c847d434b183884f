use crate::frame::Frame;
use anyhow::Result;

/// One detected keypoint. `x` and `y` are normalized to the frame size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth; 0.0 for models without a depth output
    pub z: f32,
    /// Confidence that the keypoint is present and visible, 0.0-1.0
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }
}

/// Ordered keypoints of one person, indexed by the skeleton topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub landmarks: Vec<Landmark>,
}

impl Pose {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Mean keypoint visibility; 0.0 for an empty pose.
    pub fn score(&self) -> f32 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        self.landmarks.iter().map(|l| l.visibility).sum::<f32>() / self.landmarks.len() as f32
    }
}

/// Detector output for one frame: `None` when no person was found
pub type PoseResult = Option<Pose>;

/// Trait for pose estimation backends
pub trait PoseDetector {
    /// Detect the pose of one person in an RGB frame
    ///
    /// Any temporal smoothing across calls is internal to the detector.
    fn detect(&mut self, rgb: &Frame) -> Result<PoseResult>;

    /// Release model resources. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}
