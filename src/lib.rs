//! Real-time cartoon stylization with a pose overlay.
//!
//! Every frame pulled from the camera goes through:
//! 1. BGR to RGB conversion and pose detection
//! 2. Cartoonization: median-blurred adaptive-threshold edges masking a
//!    bilateral-smoothed copy of the frame (or the edges alone in sketch mode)
//! 3. Drawing the detected skeleton onto the stylized frame
//! 4. Presenting the result
//!
//! Stage failures degrade the frame instead of stopping the loop; see
//! [`pipeline::select_display`].

/// Camera discovery and frame acquisition
pub mod capture;

/// Skeleton overlay drawing
pub mod composite;

/// Configuration management
pub mod config;

/// Error types
pub mod error;

/// Pixel buffers shared by all stages
pub mod frame;

/// Presentation targets and exit keys
pub mod output;

/// Session lifecycle and frame loop
pub mod pipeline;

/// Pose detection backends
pub mod pose;

/// Ctrl+C handling
pub mod shutdown;

/// Edge extraction, smoothing and cartoonization
pub mod stylize;

pub use error::{ConfigError, DrawError, PipelineError, StageError, StartupError};
pub use frame::{Frame, PixelFormat};
