mod webcam;

pub use webcam::{NokhwaCameraProvider, WebcamCapture};

use crate::error::StartupError;
use crate::frame::{DepthFrame, Frame};
use anyhow::Result;

/// Identity of an attached camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    /// Serial number used to select the device
    pub serial: String,
    /// Backend index used to open it
    pub index: u32,
    pub name: String,
}

/// Everything the camera delivered for one poll. Any stream may be missing.
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    pub color: Option<Frame>,
    pub depth: Option<DepthFrame>,
    pub raw_depth: Option<DepthFrame>,
}

/// Trait for an opened camera stream
pub trait FrameSource {
    /// Poll the next set of frames; a missing color frame is not an error
    fn get_frames(&mut self) -> Result<FrameSet>;

    fn serial_number(&self) -> &str;

    /// Get the resolution of captured color frames
    fn resolution(&self) -> (u32, u32);

    /// Stop streaming. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()>;
}

/// Trait for device discovery and opening
pub trait CameraProvider {
    type Camera: FrameSource;

    fn enumerate_devices(&self) -> Result<Vec<DeviceId>>;

    fn open_camera(&self, device: &DeviceId) -> Result<Self::Camera>;
}

/// Pick the requested device, falling back to the first one found.
pub fn select_device<'a>(
    devices: &'a [DeviceId],
    requested_serial: Option<&str>,
) -> Result<&'a DeviceId, StartupError> {
    let first = devices.first().ok_or(StartupError::NoDevices)?;

    match requested_serial {
        Some(serial) => match devices.iter().find(|d| d.serial == serial) {
            Some(device) => Ok(device),
            None => {
                tracing::warn!(
                    "Target serial {} not found. Using first available device: {}",
                    serial,
                    first.serial
                );
                Ok(first)
            }
        },
        None => Ok(first),
    }
}
