mod edges;
mod smooth;

pub use edges::{
    adaptive_threshold, clamp_kernel, extract_edges, median_blur, ADAPTIVE_BIAS, ADAPTIVE_BLOCK_SIZE,
};
pub use smooth::{bilateral_filter, BilateralParams, BilateralSmoother, Smoother};

use crate::error::StageError;
use crate::frame::Frame;

/// Default stylization kernel size
pub const DEFAULT_KERNEL_SIZE: u32 = 5;

/// Cartoon stylization: flattened colors kept only inside the line-art mask.
///
/// Stylization is best-effort. An invalid input frame is reported as
/// [`StageError::InvalidInput`], but a failure inside the filters yields an
/// unmodified copy of the input instead of an error.
pub struct Cartoonizer<S = BilateralSmoother> {
    kernel_size: u32,
    sketch_mode: bool,
    smoother: S,
}

impl Cartoonizer<BilateralSmoother> {
    pub fn new(kernel_size: u32, sketch_mode: bool) -> Self {
        Self::with_smoother(kernel_size, sketch_mode, BilateralSmoother)
    }
}

impl<S: Smoother> Cartoonizer<S> {
    pub fn with_smoother(kernel_size: u32, sketch_mode: bool, smoother: S) -> Self {
        Self {
            kernel_size,
            sketch_mode,
            smoother,
        }
    }

    pub fn kernel_size(&self) -> u32 {
        self.kernel_size
    }

    pub fn sketch_mode(&self) -> bool {
        self.sketch_mode
    }

    /// Stylize one color frame.
    ///
    /// In sketch mode the edge mask itself is returned and the smoother is
    /// never run.
    pub fn cartoonize(&self, frame: &Frame) -> Result<Frame, StageError> {
        let _span = tracing::debug_span!("cartoonize", sketch = self.sketch_mode).entered();

        frame.validate()?;
        if !frame.format.is_color() {
            return Err(StageError::InvalidInput(format!(
                "cartoonize expects a color frame, got {:?}",
                frame.format
            )));
        }

        match self.stylize(frame) {
            Ok(stylized) => Ok(stylized),
            Err(e) => {
                tracing::warn!(
                    "Cartoonization failed on {}x{} {:?} frame: {}; keeping original",
                    frame.width,
                    frame.height,
                    frame.format,
                    e
                );
                Ok(frame.clone())
            }
        }
    }

    fn stylize(&self, frame: &Frame) -> Result<Frame, StageError> {
        let edges = extract_edges(frame, self.kernel_size)?;
        if self.sketch_mode {
            return Ok(edges);
        }

        let color = self.smoother.smooth(frame, self.kernel_size)?;
        mask_and(&color, &edges)
    }
}

/// Per-byte AND of a color frame with a same-sized mask.
pub fn mask_and(color: &Frame, mask: &Frame) -> Result<Frame, StageError> {
    color.validate()?;
    mask.validate()?;
    if color.dimensions() != mask.dimensions() || color.format != mask.format {
        return Err(StageError::Filter(format!(
            "mask {}x{} {:?} does not match frame {}x{} {:?}",
            mask.width, mask.height, mask.format, color.width, color.height, color.format
        )));
    }

    let data = color
        .data
        .iter()
        .zip(mask.data.iter())
        .map(|(&c, &m)| c & m)
        .collect();
    Frame::new(color.width, color.height, color.format, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSmoother;

    impl Smoother for FailingSmoother {
        fn smooth(&self, _frame: &Frame, _kernel_size: u32) -> Result<Frame, StageError> {
            Err(StageError::Filter("forced failure".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingSmoother {
        calls: AtomicUsize,
    }

    impl Smoother for CountingSmoother {
        fn smooth(&self, frame: &Frame, kernel_size: u32) -> Result<Frame, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            BilateralSmoother.smooth(frame, kernel_size)
        }
    }

    fn scene() -> Frame {
        Frame::from_fn(32, 24, PixelFormat::Bgr8, |x, y| {
            if (8..24).contains(&x) && (6..18).contains(&y) {
                [40, 180, 220]
            } else {
                [(x * 7) as u8, (y * 9) as u8, 90]
            }
        })
    }

    #[test]
    fn test_smoother_failure_returns_original() {
        let frame = scene();
        let cartoonizer = Cartoonizer::with_smoother(5, false, FailingSmoother);
        let out = cartoonizer.cartoonize(&frame).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_sketch_mode_equals_edges_and_skips_smoother() {
        let frame = scene();
        let cartoonizer = Cartoonizer::with_smoother(5, true, CountingSmoother::default());
        let out = cartoonizer.cartoonize(&frame).unwrap();
        assert_eq!(out, extract_edges(&frame, 5).unwrap());
        assert_eq!(cartoonizer.smoother.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cartoon_is_masked_smoothed_frame() {
        let frame = scene();
        let out = Cartoonizer::new(5, false).cartoonize(&frame).unwrap();
        let edges = extract_edges(&frame, 5).unwrap();
        let smoothed = BilateralSmoother.smooth(&frame, 5).unwrap();

        assert_eq!(out.dimensions(), frame.dimensions());
        for ((&o, &e), &s) in out.data.iter().zip(&edges.data).zip(&smoothed.data) {
            if e == 0 {
                assert_eq!(o, 0);
            } else {
                assert_eq!(o, s);
            }
        }
    }

    #[test]
    fn test_empty_input_is_error() {
        let frame = Frame {
            width: 4,
            height: 0,
            format: PixelFormat::Bgr8,
            data: Vec::new(),
        };
        let result = Cartoonizer::new(5, false).cartoonize(&frame);
        assert!(matches!(result, Err(StageError::InvalidInput(_))));
    }

    #[test]
    fn test_tiny_frame() {
        let frame = Frame::filled(2, 1, PixelFormat::Bgr8, &[100, 100, 100]);
        let out = Cartoonizer::new(9, false).cartoonize(&frame).unwrap();
        assert_eq!(out.dimensions(), (2, 1));
    }

    #[test]
    fn test_mask_and_dimension_mismatch() {
        let a = Frame::filled(2, 2, PixelFormat::Bgr8, &[1, 2, 3]);
        let b = Frame::filled(3, 2, PixelFormat::Bgr8, &[255, 255, 255]);
        assert!(matches!(mask_and(&a, &b), Err(StageError::Filter(_))));
    }
}
