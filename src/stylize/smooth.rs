use crate::error::StageError;
use crate::frame::Frame;
use rayon::prelude::*;

/// Lower bound on both bilateral sigmas so small kernels still smooth
pub const MIN_SIGMA: f32 = 10.0;

/// Sigma growth per unit of kernel size
pub const SIGMA_PER_KERNEL: f32 = 15.0;

/// Edge-preserving smoothing stage.
///
/// Implementations must either return a frame with the input's dimensions and
/// format or an error; never a partially written buffer.
pub trait Smoother: Send + Sync {
    fn smooth(&self, frame: &Frame, kernel_size: u32) -> Result<Frame, StageError>;
}

/// Bilateral filter parameters derived from the stylization kernel size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilateralParams {
    pub radius: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

impl BilateralParams {
    /// Diameter `2k`, both sigmas `max(10, 15k)`.
    pub fn from_kernel_size(kernel_size: u32) -> Self {
        let k = kernel_size.max(1);
        let sigma = (k as f32 * SIGMA_PER_KERNEL).max(MIN_SIGMA);
        Self {
            radius: k,
            sigma_color: sigma,
            sigma_space: sigma,
        }
    }
}

/// Bilateral smoothing over all color channels jointly.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilateralSmoother;

impl Smoother for BilateralSmoother {
    fn smooth(&self, frame: &Frame, kernel_size: u32) -> Result<Frame, StageError> {
        bilateral_filter(frame, BilateralParams::from_kernel_size(kernel_size))
    }
}

/// Weighted neighbourhood average where weights fall off with both spatial
/// distance and color distance (L1 over channels), reflect-101 borders.
pub fn bilateral_filter(frame: &Frame, params: BilateralParams) -> Result<Frame, StageError> {
    let _span = tracing::debug_span!("bilateral_filter", radius = params.radius).entered();

    frame.validate()?;
    if !frame.format.is_color() {
        return Err(StageError::Filter(format!(
            "bilateral filter expects a color frame, got {:?}",
            frame.format
        )));
    }
    if !(params.sigma_color > 0.0 && params.sigma_space > 0.0) {
        return Err(StageError::Filter(format!(
            "bilateral sigmas must be positive, got color={} space={}",
            params.sigma_color, params.sigma_space
        )));
    }

    let radius = params.radius.max(1) as i64;
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride();

    let space_coeff = -0.5 / (params.sigma_space * params.sigma_space);
    let color_coeff = -0.5 / (params.sigma_color * params.sigma_color);

    // Offsets inside the circular window and their spatial weights
    let mut taps = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            taps.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    let color_weights: Vec<f32> = (0..=255 * 3)
        .map(|d: u32| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let src = &frame.data;
    let mut out = vec![0u8; src.len()];

    out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..width {
            let center = &src[y * stride + x * 3..y * stride + x * 3 + 3];
            let mut acc = [0f32; 3];
            let mut weight_sum = 0f32;

            for &(dx, dy, space_weight) in &taps {
                let sx = reflect101(x as i64 + dx, width);
                let sy = reflect101(y as i64 + dy, height);
                let idx = sy * stride + sx * 3;
                let px = &src[idx..idx + 3];

                let diff = center
                    .iter()
                    .zip(px)
                    .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs())
                    .sum::<u32>();
                let w = space_weight * color_weights[diff as usize];

                acc[0] += w * px[0] as f32;
                acc[1] += w * px[1] as f32;
                acc[2] += w * px[2] as f32;
                weight_sum += w;
            }

            // Center tap has weight 1, so the sum never vanishes
            for c in 0..3 {
                row[x * 3 + c] = (acc[c] / weight_sum).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    Frame::new(frame.width, frame.height, frame.format, out)
}

/// Mirror an out-of-range index without repeating the edge sample.
fn reflect101(i: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let n = len as i64;
    let period = 2 * (n - 1);
    let m = i.rem_euclid(period);
    (if m >= n { period - m } else { m }) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    #[test]
    fn test_params_scale_with_kernel() {
        let p = BilateralParams::from_kernel_size(5);
        assert_eq!(p.radius, 5);
        assert_eq!(p.sigma_color, 75.0);
        assert_eq!(p.sigma_space, 75.0);
    }

    #[test]
    fn test_params_floor_at_small_kernel() {
        let p = BilateralParams::from_kernel_size(0);
        assert_eq!(p.radius, 1);
        assert_eq!(p.sigma_color, MIN_SIGMA);
        assert_eq!(p.sigma_space, MIN_SIGMA);
    }

    #[test]
    fn test_uniform_frame_unchanged() {
        let frame = Frame::filled(12, 9, PixelFormat::Bgr8, &[10, 140, 230]);
        let smoothed = BilateralSmoother.smooth(&frame, 5).unwrap();
        assert_eq!(smoothed, frame);
    }

    #[test]
    fn test_noise_is_reduced() {
        let frame = Frame::from_fn(20, 20, PixelFormat::Rgb8, |x, y| {
            let v = if (x + y) % 2 == 0 { 120 } else { 130 };
            [v, v, v]
        });
        let smoothed = BilateralSmoother.smooth(&frame, 3).unwrap();
        let spread = |f: &Frame| {
            let max = *f.data.iter().max().unwrap();
            let min = *f.data.iter().min().unwrap();
            max - min
        };
        assert!(spread(&smoothed) < spread(&frame));
    }

    #[test]
    fn test_strong_edge_preserved() {
        let frame = Frame::from_fn(20, 10, PixelFormat::Bgr8, |x, _| {
            if x < 10 {
                [0, 0, 0]
            } else {
                [255, 255, 255]
            }
        });
        let smoothed = BilateralSmoother.smooth(&frame, 1).unwrap();
        assert!(smoothed.pixel(9, 5)[0] < 30);
        assert!(smoothed.pixel(10, 5)[0] > 225);
    }

    #[test]
    fn test_rejects_gray_input() {
        let gray = Frame::filled(4, 4, PixelFormat::Gray8, &[1]);
        assert!(matches!(
            BilateralSmoother.smooth(&gray, 5),
            Err(StageError::Filter(_))
        ));
    }

    #[test]
    fn test_single_pixel() {
        let frame = Frame::filled(1, 1, PixelFormat::Bgr8, &[1, 2, 3]);
        assert_eq!(BilateralSmoother.smooth(&frame, 5).unwrap(), frame);
    }

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(-7, 2), 1);
        assert_eq!(reflect101(3, 1), 0);
    }
}
