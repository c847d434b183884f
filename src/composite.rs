//! Pose overlay drawn in place onto a display frame.

use crate::error::DrawError;
use crate::frame::{Frame, PixelFormat};
use crate::pose::topology::{keypoint_part, BodyPart, CONNECTIONS};
use crate::pose::Pose;

/// Landmarks at or below this visibility are not drawn
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// Color (RGB order) and size used for one body part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStyle {
    pub color: [u8; 3],
    pub thickness: i32,
    pub radius: i32,
}

/// Style lookup keyed by body part
pub fn style_for(part: BodyPart) -> DrawStyle {
    match part {
        BodyPart::Face => DrawStyle {
            color: [224, 224, 224],
            thickness: 2,
            radius: 3,
        },
        BodyPart::Torso => DrawStyle {
            color: [255, 255, 255],
            thickness: 3,
            radius: 4,
        },
        BodyPart::LeftLimb => DrawStyle {
            color: [255, 138, 0],
            thickness: 3,
            radius: 4,
        },
        BodyPart::RightLimb => DrawStyle {
            color: [0, 217, 231],
            thickness: 3,
            radius: 4,
        },
    }
}

/// What the compositor drew for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeReport {
    pub landmarks_drawn: usize,
    pub connections_drawn: usize,
    pub failures: Vec<DrawError>,
}

/// Overlay `pose` onto `frame` in place.
///
/// With no pose the frame is left untouched. A landmark with unusable
/// coordinates is recorded as a failure and skipped together with its
/// connections; the rest of the skeleton is still drawn.
pub fn draw_landmarks(frame: &mut Frame, pose: Option<&Pose>) -> CompositeReport {
    let mut report = CompositeReport::default();
    let Some(pose) = pose else {
        return report;
    };
    if frame.validate().is_err() {
        tracing::warn!("Skipping overlay on invalid {}x{} frame", frame.width, frame.height);
        return report;
    }

    let positions: Vec<Option<(f32, f32)>> = pose
        .landmarks
        .iter()
        .enumerate()
        .map(|(index, landmark)| {
            if landmark.visibility <= VISIBILITY_THRESHOLD {
                return None;
            }
            match to_pixel(index, landmark.x, landmark.y, frame.width, frame.height) {
                Ok(point) => Some(point),
                Err(e) => {
                    tracing::debug!("Skipping landmark: {}", e);
                    report.failures.push(e);
                    None
                }
            }
        })
        .collect();

    for &(a, b, part) in CONNECTIONS {
        if let (Some(Some(pa)), Some(Some(pb))) = (positions.get(a), positions.get(b)) {
            let style = style_for(part);
            draw_line(frame, *pa, *pb, style.color, style.thickness);
            report.connections_drawn += 1;
        }
    }

    for (index, position) in positions.iter().enumerate() {
        if let Some((x, y)) = position {
            let style = style_for(keypoint_part(index));
            draw_circle(frame, (*x as i32, *y as i32), style.radius, style.color);
            report.landmarks_drawn += 1;
        }
    }

    if !report.failures.is_empty() {
        tracing::warn!("{} landmark(s) could not be drawn", report.failures.len());
    }
    report
}

/// De-normalize a landmark, rejecting positions that do not land on the frame.
fn to_pixel(index: usize, x: f32, y: f32, width: u32, height: u32) -> Result<(f32, f32), DrawError> {
    if !x.is_finite() || !y.is_finite() {
        return Err(DrawError::NonFinite { index });
    }
    let px = x * width as f32;
    let py = y * height as f32;
    if px < 0.0 || py < 0.0 || px >= width as f32 || py >= height as f32 {
        return Err(DrawError::OutOfBounds {
            index,
            x: px,
            y: py,
            width,
            height,
        });
    }
    Ok((px, py))
}

fn draw_line(frame: &mut Frame, p0: (f32, f32), p1: (f32, f32), color: [u8; 3], thickness: i32) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel_safe(frame, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(frame: &mut Frame, center: (i32, i32), radius: i32, color: [u8; 3]) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(frame, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(frame: &mut Frame, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= frame.width || uy >= frame.height {
        return;
    }
    let channels = frame.channels();
    let idx = (uy as usize * frame.width as usize + ux as usize) * channels;
    if idx + channels > frame.data.len() {
        return;
    }
    let px = &mut frame.data[idx..idx + channels];
    match frame.format {
        PixelFormat::Rgb8 => px.copy_from_slice(&color),
        PixelFormat::Bgr8 => px.copy_from_slice(&[color[2], color[1], color[0]]),
        PixelFormat::Gray8 => px[0] = color.iter().map(|&c| c as u32).sum::<u32>().div_ceil(3) as u8,
    }
}
