//! Session lifecycle and the per-frame orchestration loop.

use crate::capture::{select_device, CameraProvider, FrameSource};
use crate::composite::draw_landmarks;
use crate::config::LoopConfig;
use crate::error::{PipelineError, StageError, StartupError};
use crate::frame::Frame;
use crate::output::DisplaySink;
use crate::pose::{PoseDetector, PoseResult};
use crate::shutdown::ShutdownSignal;
use crate::stylize::{BilateralSmoother, Cartoonizer, Smoother};
use std::time::{Duration, Instant};

/// Camera, detector and display bound for the lifetime of the process.
///
/// Teardown runs exactly once, either explicitly or on drop.
pub struct Session<C: FrameSource, O: DisplaySink> {
    camera: C,
    detector: Option<Box<dyn PoseDetector>>,
    display: O,
    torn_down: bool,
}

impl<C: FrameSource, O: DisplaySink> Session<C, O> {
    /// Bind a session from already opened parts
    pub fn new(camera: C, detector: Option<Box<dyn PoseDetector>>, display: O) -> Self {
        Self {
            camera,
            detector,
            display,
            torn_down: false,
        }
    }

    /// Discover devices, open the camera, then build detector and display.
    ///
    /// Nothing is constructed when no device is found. When a later step
    /// fails, everything opened before it is released again.
    pub fn start<P, FD, FO>(
        provider: &P,
        requested_serial: Option<&str>,
        make_detector: FD,
        make_display: FO,
    ) -> Result<Self, StartupError>
    where
        P: CameraProvider<Camera = C>,
        FD: FnOnce() -> anyhow::Result<Option<Box<dyn PoseDetector>>>,
        FO: FnOnce(&C) -> anyhow::Result<O>,
    {
        tracing::info!("Querying device serial numbers...");
        let devices = provider.enumerate_devices().map_err(StartupError::Enumerate)?;
        let serials: Vec<&str> = devices.iter().map(|d| d.serial.as_str()).collect();
        tracing::info!("Available devices: {:?}", serials);

        let device = select_device(&devices, requested_serial)?;

        let mut camera = provider
            .open_camera(device)
            .map_err(|source| StartupError::DeviceInit {
                serial: device.serial.clone(),
                source,
            })?;

        let mut detector = match make_detector() {
            Ok(detector) => detector,
            Err(e) => {
                release("camera", camera.close());
                return Err(StartupError::Detector(e));
            }
        };

        let display = match make_display(&camera) {
            Ok(display) => display,
            Err(e) => {
                release("camera", camera.close());
                if let Some(detector) = detector.as_mut() {
                    release("pose detector", detector.close());
                }
                return Err(StartupError::Display(e));
            }
        };

        Ok(Self::new(camera, detector, display))
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn display(&self) -> &O {
        &self.display
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release camera, detector and display. Each release is attempted even
    /// if an earlier one fails. Returns false when already torn down.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;

        tracing::info!("Closing cameras and resources...");
        release("camera", self.camera.close());
        if let Some(detector) = self.detector.as_mut() {
            release("pose detector", detector.close());
        }
        release("display", self.display.close());
        tracing::info!("Process finished.");
        true
    }
}

impl<C: FrameSource, O: DisplaySink> Drop for Session<C, O> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn release(what: &str, result: anyhow::Result<()>) {
    match result {
        Ok(()) => tracing::debug!("Released {}", what),
        Err(e) => tracing::error!("Failed to release {}: {:#}", what, e),
    }
}

/// Where the orchestrator is within one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Acquiring,
    Detecting,
    Stylizing,
    Compositing,
    Presenting,
    ExitRequested,
}

/// Which frame is presented for an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySource {
    /// Cartoonized frame
    Stylized,
    /// Raw frame because stylization failed
    RawStylizeFailed,
    /// Raw frame because RGB conversion failed; nothing else ran
    RawConversionFailed,
}

/// Fallback table over the stage outcomes of one iteration.
///
/// | conversion | stylization | display                 | overlay        |
/// |------------|-------------|-------------------------|----------------|
/// | failed     | skipped     | raw                     | never          |
/// | ok         | failed      | raw                     | if pose found  |
/// | ok         | ok          | stylized                | if pose found  |
pub fn select_display(conversion_ok: bool, stylize_ok: bool, pose_found: bool) -> (DisplaySource, bool) {
    match (conversion_ok, stylize_ok) {
        (false, _) => (DisplaySource::RawConversionFailed, false),
        (true, false) => (DisplaySource::RawStylizeFailed, pose_found),
        (true, true) => (DisplaySource::Stylized, pose_found),
    }
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub source: DisplaySource,
    pub pose_detected: bool,
    pub detection_failed: bool,
    pub overlay_drawn: bool,
    pub overlay_failures: usize,
}

/// Counters over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_presented: u64,
    pub acquisition_gaps: u64,
    pub conversion_fallbacks: u64,
    pub stylize_fallbacks: u64,
    pub detection_failures: u64,
    pub overlay_failures: u64,
    pub present_failures: u64,
}

impl RunSummary {
    fn record(&mut self, report: &IterationReport) {
        match report.source {
            DisplaySource::Stylized => {}
            DisplaySource::RawStylizeFailed => self.stylize_fallbacks += 1,
            DisplaySource::RawConversionFailed => self.conversion_fallbacks += 1,
        }
        if report.detection_failed {
            self.detection_failures += 1;
        }
        self.overlay_failures += report.overlay_failures as u64;
    }
}

#[derive(Default)]
struct StageTimings {
    frames: u64,
    capture: Duration,
    detect: Duration,
    stylize: Duration,
    composite: Duration,
    output: Duration,
}

impl StageTimings {
    fn log_averages(&self) {
        let avg_ms = |d: Duration| d.as_secs_f64() * 1000.0 / self.frames as f64;
        let capture_ms = avg_ms(self.capture);
        let detect_ms = avg_ms(self.detect);
        let stylize_ms = avg_ms(self.stylize);
        let composite_ms = avg_ms(self.composite);
        let output_ms = avg_ms(self.output);
        let total_ms = capture_ms + detect_ms + stylize_ms + composite_ms + output_ms;
        let actual_fps = if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 };

        tracing::info!(
            "Frame {}: capture={:.1}ms, detect={:.1}ms, stylize={:.1}ms, composite={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
            self.frames,
            capture_ms,
            detect_ms,
            stylize_ms,
            composite_ms,
            output_ms,
            total_ms,
            actual_fps
        );
    }
}

const STATS_INTERVAL: u64 = 30;

/// Drives acquire, detect, stylize, composite and present, one frame at a time.
pub struct Pipeline<C: FrameSource, O: DisplaySink, S: Smoother = BilateralSmoother> {
    session: Session<C, O>,
    cartoonizer: Cartoonizer<S>,
    loop_config: LoopConfig,
    shutdown: ShutdownSignal,
    window_label: String,
    state: PipelineState,
    summary: RunSummary,
    timings: StageTimings,
}

impl<C: FrameSource, O: DisplaySink, S: Smoother> Pipeline<C, O, S> {
    pub fn new(
        session: Session<C, O>,
        cartoonizer: Cartoonizer<S>,
        loop_config: LoopConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        let window_label = format!("Camera {} Cartoon Pose", session.camera.serial_number());
        Self {
            session,
            cartoonizer,
            loop_config,
            shutdown,
            window_label,
            state: PipelineState::Idle,
            summary: RunSummary::default(),
            timings: StageTimings::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn window_label(&self) -> &str {
        &self.window_label
    }

    /// Run until the exit key, an interrupt or camera starvation, then tear
    /// the session down. Teardown happens exactly once on every path.
    pub fn run(mut self) -> Result<RunSummary, PipelineError> {
        tracing::info!("Starting main loop...");
        if self.cartoonizer.sketch_mode() {
            tracing::info!("Sketch mode enabled");
        }
        tracing::info!("Press q + Enter or Ctrl+C to stop");

        let result = self.run_loop();
        self.transition(PipelineState::ExitRequested);
        self.session.teardown();

        if let Err(e) = &result {
            tracing::error!("{}", e);
        }
        result.map(|()| self.summary.clone())
    }

    fn run_loop(&mut self) -> Result<(), PipelineError> {
        let frame_duration = self.loop_config.frame_duration();
        let starvation_timeout = self.loop_config.starvation_timeout();
        let mut last_color = Instant::now();

        loop {
            if self.shutdown.is_triggered() {
                tracing::info!("Process interrupted by user.");
                return Ok(());
            }

            let loop_start = Instant::now();

            self.transition(PipelineState::Acquiring);
            let capture_start = Instant::now();
            let color = match self.session.camera.get_frames() {
                Ok(frames) => frames.color,
                Err(e) => {
                    tracing::warn!("Frame acquisition failed: {:#}", e);
                    None
                }
            };

            let Some(raw) = color else {
                self.summary.acquisition_gaps += 1;
                if let Some(timeout) = starvation_timeout {
                    if last_color.elapsed() >= timeout {
                        return Err(PipelineError::CameraStarved(timeout));
                    }
                }
                tracing::debug!("No color frame available, retrying");
                self.transition(PipelineState::Idle);
                std::thread::sleep(self.loop_config.backoff());
                continue;
            };
            last_color = Instant::now();
            self.timings.capture += capture_start.elapsed();

            let (display_frame, report) = self.process_frame(raw);
            self.summary.record(&report);

            self.transition(PipelineState::Presenting);
            let output_start = Instant::now();
            if let Err(e) = self.session.display.present(&self.window_label, &display_frame) {
                self.summary.present_failures += 1;
                tracing::warn!("Failed to present frame: {:#}", e);
            }
            self.timings.output += output_start.elapsed();

            self.summary.frames_presented += 1;
            self.timings.frames += 1;
            if self.timings.frames % STATS_INTERVAL == 0 {
                self.timings.log_averages();
            }

            if self.session.display.poll_exit() {
                tracing::info!("Exit key pressed.");
                return Ok(());
            }
            self.transition(PipelineState::Idle);

            // Frame rate limiting
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    /// Detect, stylize and composite one raw color frame.
    ///
    /// Stage failures never escape: the returned frame follows
    /// [`select_display`].
    pub fn process_frame(&mut self, raw: Frame) -> (Frame, IterationReport) {
        self.transition(PipelineState::Detecting);
        let detect_start = Instant::now();

        let rgb = match raw.to_rgb() {
            Ok(rgb) => rgb,
            Err(e) => {
                tracing::warn!("Error converting BGR to RGB: {}", e);
                self.timings.detect += detect_start.elapsed();
                let (source, _) = select_display(false, false, false);
                let report = IterationReport {
                    source,
                    pose_detected: false,
                    detection_failed: false,
                    overlay_drawn: false,
                    overlay_failures: 0,
                };
                return (raw, report);
            }
        };

        let (pose, detection_failed) = self.detect(&rgb);
        drop(rgb);
        self.timings.detect += detect_start.elapsed();

        self.transition(PipelineState::Stylizing);
        let stylize_start = Instant::now();
        let stylized = self.cartoonizer.cartoonize(&raw);
        self.timings.stylize += stylize_start.elapsed();

        let (source, composite) = select_display(true, stylized.is_ok(), pose.is_some());
        let mut display_frame = match stylized {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Cartoonization failed, displaying original: {}", e);
                raw
            }
        };

        let mut overlay_failures = 0;
        if composite {
            self.transition(PipelineState::Compositing);
            let composite_start = Instant::now();
            let report = draw_landmarks(&mut display_frame, pose.as_ref());
            overlay_failures = report.failures.len();
            self.timings.composite += composite_start.elapsed();
        }

        let report = IterationReport {
            source,
            pose_detected: pose.is_some(),
            detection_failed,
            overlay_drawn: composite,
            overlay_failures,
        };
        (display_frame, report)
    }

    fn detect(&mut self, rgb: &Frame) -> (PoseResult, bool) {
        let Some(detector) = self.session.detector.as_mut() else {
            return (None, false);
        };
        match detector.detect(rgb) {
            Ok(pose) => (pose, false),
            Err(e) => {
                let e = StageError::Detection(e);
                tracing::warn!("Error during {} pose processing: {:#}", detector.name(), e);
                (None, true)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_failure_wins() {
        assert_eq!(
            select_display(false, true, true),
            (DisplaySource::RawConversionFailed, false)
        );
        assert_eq!(
            select_display(false, false, false),
            (DisplaySource::RawConversionFailed, false)
        );
    }

    #[test]
    fn test_stylize_failure_still_composites() {
        assert_eq!(
            select_display(true, false, true),
            (DisplaySource::RawStylizeFailed, true)
        );
        assert_eq!(
            select_display(true, false, false),
            (DisplaySource::RawStylizeFailed, false)
        );
    }

    #[test]
    fn test_normal_path() {
        assert_eq!(select_display(true, true, true), (DisplaySource::Stylized, true));
        assert_eq!(select_display(true, true, false), (DisplaySource::Stylized, false));
    }

    #[test]
    fn test_summary_counts_fallbacks() {
        let mut summary = RunSummary::default();
        summary.record(&IterationReport {
            source: DisplaySource::RawConversionFailed,
            pose_detected: false,
            detection_failed: false,
            overlay_drawn: false,
            overlay_failures: 0,
        });
        summary.record(&IterationReport {
            source: DisplaySource::RawStylizeFailed,
            pose_detected: true,
            detection_failed: true,
            overlay_drawn: true,
            overlay_failures: 2,
        });
        assert_eq!(summary.conversion_fallbacks, 1);
        assert_eq!(summary.stylize_fallbacks, 1);
        assert_eq!(summary.detection_failures, 1);
        assert_eq!(summary.overlay_failures, 2);
    }
}
