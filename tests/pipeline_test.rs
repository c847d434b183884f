//! Frame loop behaviour against in-memory camera, detector and display

use anyhow::{anyhow, Result};
use cartoon_pose::capture::{CameraProvider, DeviceId, FrameSet, FrameSource};
use cartoon_pose::config::LoopConfig;
use cartoon_pose::output::DisplaySink;
use cartoon_pose::pipeline::{DisplaySource, Pipeline, Session};
use cartoon_pose::pose::topology::{KEYPOINT_COUNT, LEFT_ELBOW, LEFT_SHOULDER};
use cartoon_pose::pose::{Landmark, Pose, PoseDetector, PoseResult};
use cartoon_pose::shutdown::ShutdownSignal;
use cartoon_pose::stylize::Cartoonizer;
use cartoon_pose::{Frame, PipelineError, PixelFormat, StartupError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct CallLog {
    cameras_opened: Vec<String>,
    detectors_built: usize,
    get_frames: usize,
    detect_calls: usize,
    camera_closes: usize,
    detector_closes: usize,
    display_closes: usize,
    presented: Vec<Frame>,
}

type Log = Rc<RefCell<CallLog>>;

struct MockCamera {
    serial: String,
    frames: VecDeque<Option<Frame>>,
    repeat: Option<Frame>,
    fail_close: bool,
    log: Log,
}

impl FrameSource for MockCamera {
    fn get_frames(&mut self) -> Result<FrameSet> {
        self.log.borrow_mut().get_frames += 1;
        let color = match self.frames.pop_front() {
            Some(frame) => frame,
            None => self.repeat.clone(),
        };
        Ok(FrameSet {
            color,
            ..FrameSet::default()
        })
    }

    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn resolution(&self) -> (u32, u32) {
        (32, 24)
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().camera_closes += 1;
        if self.fail_close {
            return Err(anyhow!("camera refused to stop"));
        }
        Ok(())
    }
}

struct MockProvider {
    serials: Vec<&'static str>,
    log: Log,
}

impl CameraProvider for MockProvider {
    type Camera = MockCamera;

    fn enumerate_devices(&self) -> Result<Vec<DeviceId>> {
        Ok(self
            .serials
            .iter()
            .enumerate()
            .map(|(i, s)| DeviceId {
                serial: s.to_string(),
                index: i as u32,
                name: format!("mock {}", s),
            })
            .collect())
    }

    fn open_camera(&self, device: &DeviceId) -> Result<MockCamera> {
        self.log.borrow_mut().cameras_opened.push(device.serial.clone());
        let mut cam = camera(&self.log, Vec::new(), None);
        cam.serial = device.serial.clone();
        Ok(cam)
    }
}

enum Detection {
    Nothing,
    Found(Pose),
    Fails,
}

struct MockDetector {
    detection: Detection,
    log: Log,
}

impl PoseDetector for MockDetector {
    fn detect(&mut self, rgb: &Frame) -> Result<PoseResult> {
        assert_eq!(rgb.format, PixelFormat::Rgb8);
        self.log.borrow_mut().detect_calls += 1;
        match &self.detection {
            Detection::Nothing => Ok(None),
            Detection::Found(pose) => Ok(Some(pose.clone())),
            Detection::Fails => Err(anyhow!("model exploded")),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().detector_closes += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockDisplay {
    exit_after: usize,
    log: Log,
}

impl DisplaySink for MockDisplay {
    fn present(&mut self, _label: &str, frame: &Frame) -> Result<()> {
        self.log.borrow_mut().presented.push(frame.clone());
        Ok(())
    }

    fn poll_exit(&mut self) -> bool {
        self.log.borrow().presented.len() >= self.exit_after
    }

    fn resolution(&self) -> (u32, u32) {
        (32, 24)
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().display_closes += 1;
        Ok(())
    }
}

fn camera(log: &Log, frames: Vec<Option<Frame>>, repeat: Option<Frame>) -> MockCamera {
    MockCamera {
        serial: "A".to_string(),
        frames: frames.into(),
        repeat,
        fail_close: false,
        log: log.clone(),
    }
}

fn detector(log: &Log, detection: Detection) -> Option<Box<dyn PoseDetector>> {
    Some(Box::new(MockDetector {
        detection,
        log: log.clone(),
    }))
}

fn display(log: &Log, exit_after: usize) -> MockDisplay {
    MockDisplay {
        exit_after,
        log: log.clone(),
    }
}

fn fast_loop() -> LoopConfig {
    LoopConfig {
        target_fps: 1000,
        backoff_ms: 0,
        starvation_timeout_ms: 200,
    }
}

fn color_frame() -> Frame {
    Frame::from_fn(32, 24, PixelFormat::Bgr8, |x, y| {
        if (8..24).contains(&x) && (6..18).contains(&y) {
            [30, 160, 220]
        } else {
            [200, (x * 5) as u8, (y * 7) as u8]
        }
    })
}

fn arm_pose() -> Pose {
    let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0); KEYPOINT_COUNT];
    landmarks[LEFT_SHOULDER] = Landmark::new(0.25, 0.5, 0.9);
    landmarks[LEFT_ELBOW] = Landmark::new(0.75, 0.5, 0.9);
    Pose::new(landmarks)
}

fn run(session: Session<MockCamera, MockDisplay>) -> Result<cartoon_pose::pipeline::RunSummary, PipelineError> {
    Pipeline::new(session, Cartoonizer::new(5, false), fast_loop(), ShutdownSignal::new()).run()
}

#[test]
fn test_stylized_frame_is_presented() {
    let log = Log::default();
    let raw = color_frame();
    let session = Session::new(
        camera(&log, vec![Some(raw.clone())], None),
        detector(&log, Detection::Nothing),
        display(&log, 1),
    );

    let summary = run(session).unwrap();

    let expected = Cartoonizer::new(5, false).cartoonize(&raw).unwrap();
    let log = log.borrow();
    assert_eq!(summary.frames_presented, 1);
    assert_eq!(log.presented, vec![expected]);
    assert_eq!(log.detect_calls, 1);
}

#[test]
fn test_conversion_failure_presents_raw_frame_without_overlay() {
    let log = Log::default();
    // A single-channel frame cannot be converted to RGB
    let raw = Frame::filled(32, 24, PixelFormat::Gray8, &[77]);
    let session = Session::new(
        camera(&log, vec![Some(raw.clone())], None),
        detector(&log, Detection::Found(arm_pose())),
        display(&log, 1),
    );

    let summary = run(session).unwrap();

    let log = log.borrow();
    assert_eq!(log.presented, vec![raw]);
    assert_eq!(log.detect_calls, 0);
    assert_eq!(summary.conversion_fallbacks, 1);
}

#[test]
fn test_process_frame_reports_conversion_fallback() {
    let log = Log::default();
    let session = Session::new(camera(&log, Vec::new(), None), detector(&log, Detection::Found(arm_pose())), display(&log, 1));
    let mut pipeline = Pipeline::new(session, Cartoonizer::new(5, false), fast_loop(), ShutdownSignal::new());

    let raw = Frame::filled(8, 8, PixelFormat::Gray8, &[1]);
    let (frame, report) = pipeline.process_frame(raw.clone());

    assert_eq!(frame, raw);
    assert_eq!(report.source, DisplaySource::RawConversionFailed);
    assert!(!report.overlay_drawn);
}

#[test]
fn test_detected_pose_is_composited() {
    let log = Log::default();
    let raw = color_frame();
    let session = Session::new(
        camera(&log, vec![Some(raw.clone())], None),
        detector(&log, Detection::Found(arm_pose())),
        display(&log, 1),
    );
    let mut pipeline = Pipeline::new(session, Cartoonizer::new(5, false), fast_loop(), ShutdownSignal::new());

    let (frame, report) = pipeline.process_frame(raw.clone());

    let cartoon = Cartoonizer::new(5, false).cartoonize(&raw).unwrap();
    assert_eq!(report.source, DisplaySource::Stylized);
    assert!(report.pose_detected);
    assert!(report.overlay_drawn);
    assert_ne!(frame, cartoon);
    assert_eq!(frame.dimensions(), cartoon.dimensions());
}

#[test]
fn test_detector_failure_keeps_loop_running() {
    let log = Log::default();
    let raw = color_frame();
    let session = Session::new(
        camera(&log, Vec::new(), Some(raw.clone())),
        detector(&log, Detection::Fails),
        display(&log, 3),
    );

    let summary = run(session).unwrap();

    let expected = Cartoonizer::new(5, false).cartoonize(&raw).unwrap();
    let log = log.borrow();
    assert_eq!(summary.frames_presented, 3);
    assert_eq!(summary.detection_failures, 3);
    assert!(log.presented.iter().all(|f| *f == expected));
}

#[test]
fn test_empty_frame_falls_back_to_raw() {
    let log = Log::default();
    let session = Session::new(camera(&log, Vec::new(), None), None, display(&log, 1));
    let mut pipeline = Pipeline::new(session, Cartoonizer::new(5, false), fast_loop(), ShutdownSignal::new());

    // Zero-sized frames fail conversion before any other stage runs
    let raw = Frame {
        width: 0,
        height: 0,
        format: PixelFormat::Bgr8,
        data: Vec::new(),
    };
    let (frame, report) = pipeline.process_frame(raw.clone());
    assert_eq!(frame, raw);
    assert_eq!(report.source, DisplaySource::RawConversionFailed);
}

#[test]
fn test_exit_stops_acquisition_and_closes_once() {
    let log = Log::default();
    let session = Session::new(
        camera(&log, Vec::new(), Some(color_frame())),
        detector(&log, Detection::Nothing),
        display(&log, 3),
    );

    run(session).unwrap();

    let log = log.borrow();
    assert_eq!(log.get_frames, 3);
    assert_eq!(log.presented.len(), 3);
    assert_eq!(log.camera_closes, 1);
    assert_eq!(log.detector_closes, 1);
    assert_eq!(log.display_closes, 1);
}

#[test]
fn test_acquisition_gaps_are_skipped() {
    let log = Log::default();
    let session = Session::new(
        camera(&log, vec![None, None, Some(color_frame())], None),
        detector(&log, Detection::Nothing),
        display(&log, 1),
    );

    let summary = run(session).unwrap();

    assert_eq!(summary.acquisition_gaps, 2);
    assert_eq!(summary.frames_presented, 1);
    assert_eq!(log.borrow().get_frames, 3);
}

#[test]
fn test_starved_camera_ends_loop_after_teardown() {
    let log = Log::default();
    let session = Session::new(camera(&log, Vec::new(), None), detector(&log, Detection::Nothing), display(&log, 1));
    let config = LoopConfig {
        target_fps: 1000,
        backoff_ms: 1,
        starvation_timeout_ms: 20,
    };

    let result = Pipeline::new(session, Cartoonizer::new(5, false), config, ShutdownSignal::new()).run();

    assert!(matches!(result, Err(PipelineError::CameraStarved(_))));
    let log = log.borrow();
    assert!(log.presented.is_empty());
    assert_eq!(log.camera_closes, 1);
    assert_eq!(log.detector_closes, 1);
    assert_eq!(log.display_closes, 1);
}

#[test]
fn test_interrupt_routes_to_same_teardown() {
    let log = Log::default();
    let session = Session::new(
        camera(&log, Vec::new(), Some(color_frame())),
        detector(&log, Detection::Nothing),
        display(&log, usize::MAX),
    );
    let shutdown = ShutdownSignal::new();
    shutdown.trigger();

    Pipeline::new(session, Cartoonizer::new(5, false), fast_loop(), shutdown)
        .run()
        .unwrap();

    let log = log.borrow();
    assert_eq!(log.get_frames, 0);
    assert_eq!(log.camera_closes, 1);
    assert_eq!(log.detector_closes, 1);
    assert_eq!(log.display_closes, 1);
}

#[test]
fn test_failed_release_does_not_skip_others() {
    let log = Log::default();
    let mut cam = camera(&log, Vec::new(), None);
    cam.fail_close = true;
    let mut session = Session::new(cam, detector(&log, Detection::Nothing), display(&log, 1));

    assert!(session.teardown());
    assert!(!session.teardown());
    drop(session);

    let log = log.borrow();
    assert_eq!(log.camera_closes, 1);
    assert_eq!(log.detector_closes, 1);
    assert_eq!(log.display_closes, 1);
}

#[test]
fn test_startup_falls_back_to_first_device() {
    let log = Log::default();
    let provider = MockProvider {
        serials: vec!["A", "B"],
        log: log.clone(),
    };

    let session = Session::start(
        &provider,
        Some("Z"),
        || Ok(None),
        |_camera| Ok(display(&log, 1)),
    )
    .unwrap();

    assert_eq!(session.camera().serial_number(), "A");
    assert_eq!(log.borrow().cameras_opened, vec!["A".to_string()]);
}

#[test]
fn test_startup_without_devices_constructs_nothing() {
    let log = Log::default();
    let provider = MockProvider {
        serials: Vec::new(),
        log: log.clone(),
    };

    let result = Session::start(
        &provider,
        None,
        || {
            log.borrow_mut().detectors_built += 1;
            Ok(None)
        },
        |_camera| Ok(display(&log, 1)),
    );

    assert!(matches!(result, Err(StartupError::NoDevices)));
    let log = log.borrow();
    assert!(log.cameras_opened.is_empty());
    assert_eq!(log.detectors_built, 0);
}

#[test]
fn test_detector_init_failure_releases_camera() {
    let log = Log::default();
    let provider = MockProvider {
        serials: vec!["A"],
        log: log.clone(),
    };

    let result = Session::start(
        &provider,
        None,
        || Err(anyhow!("missing model")),
        |_camera| Ok(display(&log, 1)),
    );

    assert!(matches!(result, Err(StartupError::Detector(_))));
    let log = log.borrow();
    assert_eq!(log.camera_closes, 1);
    assert_eq!(log.display_closes, 0);
}
