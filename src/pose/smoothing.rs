use super::types::{Landmark, Pose};

/// Weight of the newest observation in the exponential blend
pub const DEFAULT_SMOOTHING_ALPHA: f32 = 0.5;

/// Exponential smoothing of landmark positions across frames.
///
/// Tracking continues only while the new pose scores at least
/// `min_tracking_confidence`; below that the history is dropped and the
/// observation passes through unchanged.
pub struct LandmarkSmoother {
    alpha: f32,
    min_tracking_confidence: f32,
    previous: Option<Pose>,
}

impl LandmarkSmoother {
    pub fn new(alpha: f32, min_tracking_confidence: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            min_tracking_confidence,
            previous: None,
        }
    }

    pub fn apply(&mut self, pose: Pose) -> Pose {
        let smoothed = match &self.previous {
            Some(prev)
                if prev.len() == pose.len() && pose.score() >= self.min_tracking_confidence =>
            {
                let landmarks = pose
                    .landmarks
                    .iter()
                    .zip(&prev.landmarks)
                    .map(|(cur, old)| Landmark {
                        x: self.blend(cur.x, old.x),
                        y: self.blend(cur.y, old.y),
                        z: self.blend(cur.z, old.z),
                        visibility: cur.visibility,
                    })
                    .collect();
                Pose::new(landmarks)
            }
            _ => {
                if self.previous.is_some() {
                    tracing::debug!("Pose tracking lost (score {:.2}), resetting", pose.score());
                }
                pose
            }
        };

        self.previous = Some(smoothed.clone());
        smoothed
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    fn blend(&self, current: f32, previous: f32) -> f32 {
        self.alpha * current + (1.0 - self.alpha) * previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose_at(x: f32, visibility: f32) -> Pose {
        Pose::new(vec![Landmark::new(x, 0.5, visibility); 3])
    }

    #[test]
    fn test_first_pose_passes_through() {
        let mut smoother = LandmarkSmoother::new(0.5, 0.5);
        assert_eq!(smoother.apply(pose_at(0.2, 0.9)), pose_at(0.2, 0.9));
    }

    #[test]
    fn test_tracked_pose_is_blended() {
        let mut smoother = LandmarkSmoother::new(0.5, 0.5);
        smoother.apply(pose_at(0.2, 0.9));
        let out = smoother.apply(pose_at(0.4, 0.9));
        assert!((out.landmarks[0].x - 0.3).abs() < 1e-6);
        assert_eq!(out.landmarks[0].visibility, 0.9);
    }

    #[test]
    fn test_low_tracking_score_resets() {
        let mut smoother = LandmarkSmoother::new(0.5, 0.5);
        smoother.apply(pose_at(0.2, 0.9));
        let out = smoother.apply(pose_at(0.8, 0.3));
        assert_eq!(out, pose_at(0.8, 0.3));
    }

    #[test]
    fn test_reset_drops_history() {
        let mut smoother = LandmarkSmoother::new(0.5, 0.5);
        smoother.apply(pose_at(0.2, 0.9));
        smoother.reset();
        assert_eq!(smoother.apply(pose_at(0.6, 0.9)), pose_at(0.6, 0.9));
    }
}
