use super::{CameraProvider, DeviceId, FrameSet, FrameSource};
use crate::frame::{Frame, PixelFormat};
use anyhow::{Context, Result};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

/// Discovers and opens cameras through nokhwa
#[derive(Debug, Clone, Copy, Default)]
pub struct NokhwaCameraProvider;

impl CameraProvider for NokhwaCameraProvider {
    type Camera = WebcamCapture;

    fn enumerate_devices(&self) -> Result<Vec<DeviceId>> {
        let cameras = nokhwa::query(ApiBackend::Auto).context("Failed to query camera devices")?;

        Ok(cameras
            .iter()
            .enumerate()
            .map(|(position, info)| {
                let index = info.index().as_index().unwrap_or(position as u32);
                let misc = info.misc();
                let serial = if misc.trim().is_empty() {
                    index.to_string()
                } else {
                    misc.trim().to_string()
                };
                DeviceId {
                    serial,
                    index,
                    name: info.human_name(),
                }
            })
            .collect())
    }

    fn open_camera(&self, device: &DeviceId) -> Result<WebcamCapture> {
        WebcamCapture::new(device)
    }
}

/// Color stream of a UVC camera, delivered in BGR order like depth-camera
/// SDKs do. UVC devices have no depth stream.
pub struct WebcamCapture {
    camera: Camera,
    serial: String,
    width: u32,
    height: u32,
    streaming: bool,
}

impl WebcamCapture {
    pub fn new(device: &DeviceId) -> Result<Self> {
        tracing::info!("Initializing camera {} ({})", device.serial, device.name);

        let index = CameraIndex::Index(device.index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(index, requested).context("Failed to open camera")?;

        camera.open_stream().context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        tracing::info!(
            "Camera initialized at {}x{}",
            resolution.width(),
            resolution.height()
        );

        Ok(Self {
            camera,
            serial: device.serial.clone(),
            width: resolution.width(),
            height: resolution.height(),
            streaming: true,
        })
    }
}

impl FrameSource for WebcamCapture {
    fn get_frames(&mut self) -> Result<FrameSet> {
        if !self.streaming {
            return Ok(FrameSet::default());
        }

        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(FrameSet {
            color: Some(Frame::from_rgb_image(decoded, PixelFormat::Bgr8)),
            depth: None,
            raw_depth: None,
        })
    }

    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn close(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }
        self.streaming = false;
        self.camera
            .stop_stream()
            .context("Failed to stop camera stream")?;
        tracing::info!("Camera {} stopped", self.serial);
        Ok(())
    }
}
