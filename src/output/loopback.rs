use super::keys::ExitKeys;
use super::DisplaySink;
use crate::frame::Frame;
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Presents frames on a v4l2loopback device so any video client can show them.
pub struct LoopbackDisplay {
    path: PathBuf,
    file: Option<File>,
    device: Option<Device>,
    width: u32,
    height: u32,
    keys: ExitKeys,
    announced: bool,
}

impl LoopbackDisplay {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32, keys: ExitKeys) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = match configure_format(path, width, height) {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::warn!("Could not set YUYV format on {}: {:#}", path.display(), e);
                None
            }
        };

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            device,
            width,
            height,
            keys,
            announced: false,
        })
    }

    /// Convert RGB frame to YUV422 (YUYV) format
    fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
        let (width, height) = rgb_image.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = rgb_image.get_pixel(x, y);
                let pixel2 = if x + 1 < width {
                    rgb_image.get_pixel(x + 1, y)
                } else {
                    pixel1
                };

                let (y1, u1, v1) = rgb_to_yuv(pixel1[0], pixel1[1], pixel1[2]);
                let (y2, u2, v2) = rgb_to_yuv(pixel2[0], pixel2[1], pixel2[2]);

                // Chroma is shared by each pixel pair
                let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                yuyv.extend_from_slice(&[y1, u, y2, v]);
            }
        }

        yuyv
    }
}

fn configure_format(path: &Path, width: u32, height: u32) -> Result<Device> {
    let device = Device::with_path(path)
        .with_context(|| format!("Failed to open {} for format negotiation", path.display()))?;
    let format = Format::new(width, height, FourCC::new(b"YUYV"));
    Output::set_format(&device, &format).context("Failed to set output format")?;
    Ok(device)
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl DisplaySink for LoopbackDisplay {
    fn present(&mut self, label: &str, frame: &Frame) -> Result<()> {
        if !self.announced {
            tracing::info!("Presenting \"{}\" on {}", label, self.path.display());
            self.announced = true;
        }

        let Some(file) = self.file.as_mut() else {
            anyhow::bail!("display {} is closed", self.path.display());
        };

        let rgb = frame.to_rgb_image().context("Frame cannot be presented")?;

        let rgb = if rgb.dimensions() != (self.width, self.height) {
            image::imageops::resize(
                &rgb,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            )
        } else {
            rgb
        };

        let yuyv_data = Self::rgb_to_yuyv(&rgb);

        file.write_all(&yuyv_data)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }

    fn poll_exit(&mut self) -> bool {
        self.keys.is_pressed()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn close(&mut self) -> Result<()> {
        if self.device.take().is_some() {
            tracing::debug!("Released format handle for {}", self.path.display());
        }
        if let Some(mut file) = self.file.take() {
            file.flush().context("Failed to flush v4l2loopback device")?;
            tracing::info!("Closed v4l2loopback device {}", self.path.display());
        }
        Ok(())
    }
}
