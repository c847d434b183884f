//! Pixel buffers passed between pipeline stages.

use crate::error::StageError;
use image::RgbImage;

/// Channel layout of a [`Frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Blue, green, red; the native order of depth-camera color streams
    Bgr8,
    /// Red, green, blue; what the pose detector consumes
    Rgb8,
    /// Single luminance channel
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    pub fn is_color(self) -> bool {
        self.channels() == 3
    }
}

// BT.601 luma in 14-bit fixed point
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// Dense 8-bit image, row-major and tightly packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing buffer, rejecting empty or mis-sized data.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self, StageError> {
        let frame = Self {
            width,
            height,
            format,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Frame with every pixel set to `pixel` (one value per channel).
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> Self {
        debug_assert_eq!(pixel.len(), format.channels());
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * format.channels());
        for _ in 0..count {
            data.extend_from_slice(pixel);
        }
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Build a frame from a function of `(x, y)` returning one pixel.
    pub fn from_fn<F>(width: u32, height: u32, format: PixelFormat, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> [u8; 3],
    {
        let channels = format.channels();
        let mut data = Vec::with_capacity(width as usize * height as usize * channels);
        for y in 0..height {
            for x in 0..width {
                let px = f(x, y);
                data.extend_from_slice(&px[..channels]);
            }
        }
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn channels(&self) -> usize {
        self.format.channels()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Check the frame is non-empty and its buffer matches its dimensions.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.is_empty() {
            return Err(StageError::InvalidInput(format!(
                "empty frame ({}x{})",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * self.channels();
        if self.data.len() != expected {
            return Err(StageError::InvalidInput(format!(
                "buffer of {} bytes does not match {}x{} {:?} ({} bytes)",
                self.data.len(),
                self.width,
                self.height,
                self.format,
                expected
            )));
        }
        Ok(())
    }

    /// Pixel at `(x, y)`. Caller guarantees the frame is valid and in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.channels();
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[idx..idx + channels]
    }

    /// Single-channel luminance copy.
    pub fn to_gray(&self) -> Result<Frame, StageError> {
        self.validate()?;
        let data = match self.format {
            PixelFormat::Gray8 => self.data.clone(),
            PixelFormat::Bgr8 => self
                .data
                .chunks_exact(3)
                .map(|px| luma(px[2], px[1], px[0]))
                .collect(),
            PixelFormat::Rgb8 => self
                .data
                .chunks_exact(3)
                .map(|px| luma(px[0], px[1], px[2]))
                .collect(),
        };
        Ok(Frame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Gray8,
            data,
        })
    }

    /// Copy in RGB order, as consumed by the pose detector.
    pub fn to_rgb(&self) -> Result<Frame, StageError> {
        self.validate()
            .map_err(|e| StageError::ColorConversion(e.to_string()))?;
        let data = match self.format {
            PixelFormat::Rgb8 => self.data.clone(),
            PixelFormat::Bgr8 => swap_red_blue(&self.data),
            PixelFormat::Gray8 => {
                return Err(StageError::ColorConversion(
                    "cannot convert single-channel frame to RGB".to_string(),
                ))
            }
        };
        Ok(Frame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb8,
            data,
        })
    }

    /// Replicate a single-channel frame into a three-channel one.
    pub fn replicate(&self, format: PixelFormat) -> Result<Frame, StageError> {
        self.validate()?;
        if self.format != PixelFormat::Gray8 || !format.is_color() {
            return Err(StageError::InvalidInput(format!(
                "cannot replicate {:?} into {:?}",
                self.format, format
            )));
        }
        let data = self.data.iter().flat_map(|&v| [v, v, v]).collect();
        Ok(Frame {
            width: self.width,
            height: self.height,
            format,
            data,
        })
    }

    /// Wrap a decoded RGB image, optionally reordering it to BGR.
    pub fn from_rgb_image(image: RgbImage, format: PixelFormat) -> Self {
        let (width, height) = image.dimensions();
        let raw = image.into_raw();
        let data = match format {
            PixelFormat::Bgr8 => swap_red_blue(&raw),
            PixelFormat::Rgb8 => raw,
            PixelFormat::Gray8 => raw.chunks_exact(3).map(|px| luma(px[0], px[1], px[2])).collect(),
        };
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Convert into an `image` RGB buffer for encoding and resizing.
    pub fn to_rgb_image(&self) -> Result<RgbImage, StageError> {
        let data = match self.format {
            PixelFormat::Gray8 => self.replicate(PixelFormat::Rgb8)?.data,
            _ => self.to_rgb()?.data,
        };
        RgbImage::from_raw(self.width, self.height, data)
            .ok_or_else(|| StageError::InvalidInput("buffer too small for image".to_string()))
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B + (1 << (LUMA_SHIFT - 1));
    (sum >> LUMA_SHIFT).min(255) as u8
}

fn swap_red_blue(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(3).flat_map(|px| [px[2], px[1], px[0]]).collect()
}

/// Depth image in device units.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
    /// Millimetres per device unit
    pub depth_scale: f32,
}
