mod keys;
mod loopback;

pub use keys::{is_exit_key, ExitKeys, ESC_KEY, QUIT_KEY};
pub use loopback::LoopbackDisplay;

use crate::frame::Frame;
use anyhow::Result;

/// Trait for presentation targets
pub trait DisplaySink {
    /// Present one frame under a window label
    fn present(&mut self, label: &str, frame: &Frame) -> Result<()>;

    /// True once the user asked to stop
    fn poll_exit(&mut self) -> bool;

    /// Get the expected output resolution
    fn resolution(&self) -> (u32, u32);

    /// Release the display. Must tolerate repeated calls.
    fn close(&mut self) -> Result<()>;
}
