use crate::error::StageError;
use crate::frame::{Frame, PixelFormat};
use rayon::prelude::*;

/// Neighbourhood size of the adaptive threshold
pub const ADAPTIVE_BLOCK_SIZE: u32 = 9;

/// Constant subtracted from the local mean before thresholding
pub const ADAPTIVE_BIAS: i32 = 2;

const MASK_ON: u8 = 255;
const MASK_OFF: u8 = 0;

/// Line-art mask of a color frame.
///
/// Steps:
/// 1. Convert to grayscale
/// 2. Median blur with aperture `kernel_size` to drop speckle noise
/// 3. Adaptive mean threshold: 255 where the pixel is brighter than its local
///    mean minus [`ADAPTIVE_BIAS`], 0 on edges and dark detail
/// 4. Replicate to three channels in the source's channel order
///
/// The output only ever holds 0 and 255 and has the input's dimensions.
pub fn extract_edges(frame: &Frame, kernel_size: u32) -> Result<Frame, StageError> {
    let _span = tracing::debug_span!("extract_edges").entered();

    frame.validate()?;
    if !frame.format.is_color() {
        return Err(StageError::InvalidInput(format!(
            "edge extraction expects a color frame, got {:?}",
            frame.format
        )));
    }

    let gray = frame.to_gray()?;
    let aperture = clamp_kernel(kernel_size, frame.width.min(frame.height));
    let blurred = median_blur(&gray, aperture)?;
    let mask = adaptive_threshold(&blurred, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_BIAS)?;

    mask.replicate(frame.format)
}

/// Largest odd aperture not above `kernel_size` that still fits an image
/// whose shorter side is `extent`. Never below 1.
pub fn clamp_kernel(kernel_size: u32, extent: u32) -> u32 {
    let max_fit = (extent.max(1) * 2).saturating_sub(1);
    let k = kernel_size.max(1).min(max_fit);
    if k % 2 == 0 {
        k - 1
    } else {
        k
    }
}

/// Median filter with a square `aperture` and replicated borders.
pub fn median_blur(gray: &Frame, aperture: u32) -> Result<Frame, StageError> {
    gray.validate()?;
    if gray.format != PixelFormat::Gray8 {
        return Err(StageError::InvalidInput("median blur expects a grayscale frame".to_string()));
    }
    if aperture <= 1 {
        return Ok(gray.clone());
    }

    let width = gray.width as usize;
    let height = gray.height as usize;
    let radius = (aperture / 2) as isize;
    let src = &gray.data;
    let mut out = vec![0u8; src.len()];

    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let mut window = Vec::with_capacity((aperture * aperture) as usize);
        for (x, dst) in row.iter_mut().enumerate() {
            window.clear();
            for dy in -radius..=radius {
                let sy = clamp_index(y as isize + dy, height);
                for dx in -radius..=radius {
                    let sx = clamp_index(x as isize + dx, width);
                    window.push(src[sy * width + sx]);
                }
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable(mid);
            *dst = *median;
        }
    });

    Frame::new(gray.width, gray.height, PixelFormat::Gray8, out)
}

/// Binary threshold against the rounded local mean of a `block_size` square.
pub fn adaptive_threshold(gray: &Frame, block_size: u32, bias: i32) -> Result<Frame, StageError> {
    gray.validate()?;
    if gray.format != PixelFormat::Gray8 {
        return Err(StageError::InvalidInput(
            "adaptive threshold expects a grayscale frame".to_string(),
        ));
    }
    if block_size < 3 || block_size % 2 == 0 {
        return Err(StageError::Filter(format!(
            "adaptive threshold block size must be odd and >= 3, got {}",
            block_size
        )));
    }

    let means = box_mean(gray, (block_size / 2) as usize);
    let data = gray
        .data
        .iter()
        .zip(means.iter())
        .map(|(&src, &mean)| {
            if src as i32 - mean as i32 > -bias {
                MASK_ON
            } else {
                MASK_OFF
            }
        })
        .collect();

    Frame::new(gray.width, gray.height, PixelFormat::Gray8, data)
}

/// Rounded mean over a `(2r+1)^2` window with replicated borders.
fn box_mean(gray: &Frame, radius: usize) -> Vec<u8> {
    let width = gray.width as usize;
    let height = gray.height as usize;
    let r = radius as isize;
    let count = ((2 * radius + 1) * (2 * radius + 1)) as u32;

    // Horizontal sums, then vertical sums of those
    let mut rows = vec![0u32; width * height];
    rows.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let src = &gray.data[y * width..(y + 1) * width];
        for (x, dst) in row.iter_mut().enumerate() {
            *dst = (-r..=r)
                .map(|dx| src[clamp_index(x as isize + dx, width)] as u32)
                .sum();
        }
    });

    let mut out = vec![0u8; width * height];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, dst) in row.iter_mut().enumerate() {
            let sum: u32 = (-r..=r)
                .map(|dy| rows[clamp_index(y as isize + dy, height) * width + x])
                .sum();
            *dst = ((sum + count / 2) / count) as u8;
        }
    });
    out
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
