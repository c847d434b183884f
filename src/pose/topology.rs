//! 17-keypoint COCO body layout used by MoveNet.

/// Number of keypoints in the layout
pub const KEYPOINT_COUNT: usize = 17;

pub const NOSE: usize = 0;
pub const LEFT_EYE: usize = 1;
pub const RIGHT_EYE: usize = 2;
pub const LEFT_EAR: usize = 3;
pub const RIGHT_EAR: usize = 4;
pub const LEFT_SHOULDER: usize = 5;
pub const RIGHT_SHOULDER: usize = 6;
pub const LEFT_ELBOW: usize = 7;
pub const RIGHT_ELBOW: usize = 8;
pub const LEFT_WRIST: usize = 9;
pub const RIGHT_WRIST: usize = 10;
pub const LEFT_HIP: usize = 11;
pub const RIGHT_HIP: usize = 12;
pub const LEFT_KNEE: usize = 13;
pub const RIGHT_KNEE: usize = 14;
pub const LEFT_ANKLE: usize = 15;
pub const RIGHT_ANKLE: usize = 16;

/// Body region a keypoint or connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Face,
    Torso,
    LeftLimb,
    RightLimb,
}

/// Skeleton edges between keypoints
pub const CONNECTIONS: &[(usize, usize, BodyPart)] = &[
    (NOSE, LEFT_EYE, BodyPart::Face),
    (NOSE, RIGHT_EYE, BodyPart::Face),
    (LEFT_EYE, LEFT_EAR, BodyPart::Face),
    (RIGHT_EYE, RIGHT_EAR, BodyPart::Face),
    (LEFT_SHOULDER, RIGHT_SHOULDER, BodyPart::Torso),
    (LEFT_SHOULDER, LEFT_HIP, BodyPart::Torso),
    (RIGHT_SHOULDER, RIGHT_HIP, BodyPart::Torso),
    (LEFT_HIP, RIGHT_HIP, BodyPart::Torso),
    (LEFT_SHOULDER, LEFT_ELBOW, BodyPart::LeftLimb),
    (LEFT_ELBOW, LEFT_WRIST, BodyPart::LeftLimb),
    (LEFT_HIP, LEFT_KNEE, BodyPart::LeftLimb),
    (LEFT_KNEE, LEFT_ANKLE, BodyPart::LeftLimb),
    (RIGHT_SHOULDER, RIGHT_ELBOW, BodyPart::RightLimb),
    (RIGHT_ELBOW, RIGHT_WRIST, BodyPart::RightLimb),
    (RIGHT_HIP, RIGHT_KNEE, BodyPart::RightLimb),
    (RIGHT_KNEE, RIGHT_ANKLE, BodyPart::RightLimb),
];

/// Region of a single keypoint
pub fn keypoint_part(index: usize) -> BodyPart {
    match index {
        NOSE..=RIGHT_EAR => BodyPart::Face,
        LEFT_SHOULDER | LEFT_ELBOW | LEFT_WRIST | LEFT_KNEE | LEFT_ANKLE => BodyPart::LeftLimb,
        RIGHT_SHOULDER | RIGHT_ELBOW | RIGHT_WRIST | RIGHT_KNEE | RIGHT_ANKLE => BodyPart::RightLimb,
        _ => BodyPart::Torso,
    }
}
