use super::*;
use crate::camera::{FailurePoint, MockOpener};
use crate::capture::{CapturePipeline, CaptureReport, CaptureSettings, FrameCapturer, ImageEncoder};
use crate::error::{CaptureError, MotionCamError, SensorError};
use crate::frame::{CaptureFormat, FieldOrder};
use crate::sensor::{MotionSensor, ScriptStep, ScriptedEventSource};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Counts capture calls and flags any overlap
#[derive(Clone, Default)]
struct RecordingCapturer {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicBool>,
    fail: bool,
}

impl FrameCapturer for RecordingCapturer {
    fn capture(&mut self, output: &Path) -> Result<CaptureReport, CaptureError> {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "capture entered while another was in flight"
        );
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
        self.in_flight.store(false, Ordering::SeqCst);

        if self.fail {
            return Err(CaptureError::DequeueTimeout {
                timeout: Duration::from_millis(1),
            });
        }
        Ok(CaptureReport {
            path: output.to_path_buf(),
            width: 640,
            height: 480,
            bytes_written: 1,
            elapsed: Duration::from_millis(2),
        })
    }
}

fn settings(output_path: PathBuf) -> TriggerSettings {
    TriggerSettings {
        poll_timeout: Duration::from_millis(5),
        payload_size: 16,
        output_path,
    }
}

fn scripted(steps: Vec<ScriptStep>) -> (ScriptedEventSource, CancellationToken) {
    let token = CancellationToken::new();
    let source = ScriptedEventSource::new(steps).cancel_when_done(token.clone());
    (source, token)
}

fn mock_pipeline(opener: MockOpener) -> CapturePipeline<MockOpener> {
    let settings = CaptureSettings {
        device: "/dev/video0".to_string(),
        requested: CaptureFormat::rgb24(16, 8),
        field: FieldOrder::Interlaced,
        buffer_count: 1,
        dequeue_timeout: Duration::from_millis(50),
        allow_resolution_change: true,
    };
    CapturePipeline::new(opener, settings, ImageEncoder::default())
}

#[test]
fn test_no_motion_payload_skips_capture() {
    let (source, token) = scripted(vec![ScriptStep::payload(b'0'), ScriptStep::Timeout]);
    let log = source.log_handle();
    let capturer = RecordingCapturer::default();
    let calls = Arc::clone(&capturer.calls);

    let stats = TriggerLoop::new(source, capturer, settings(PathBuf::from("unused.jpg")), token)
        .run()
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(stats.non_motion_payloads, 1);
    assert!(stats.idle_timeouts >= 1);
    assert_eq!(stats.capture_attempts(), 0);

    let log = log.lock();
    assert_eq!(log.notifications, vec![true, false]);
    assert_eq!(log.closes, 1);
}

#[test]
fn test_motion_payload_captures_image() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("captured_image.jpg");
    let opener = MockOpener::default();
    let (source, token) = scripted(vec![ScriptStep::payload(b'1')]);

    let stats = TriggerLoop::new(source, mock_pipeline(opener.clone()), settings(output.clone()), token)
        .run()
        .unwrap();

    assert_eq!(stats.motion_events, 1);
    assert_eq!(stats.captures_succeeded, 1);
    assert_eq!(image::image_dimensions(&output).unwrap(), (16, 8));

    let log = opener.log();
    assert_eq!(log.opens, 1);
    assert_eq!(log.closes, 1);
    assert_eq!(log.maps, log.unmaps);
}

#[test]
fn test_capture_failure_keeps_loop_running() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("captured_image.jpg");
    let opener = MockOpener::failing_at(FailurePoint::Map(0));
    let (source, token) = scripted(vec![
        ScriptStep::payload(b'1'),
        ScriptStep::Timeout,
        ScriptStep::payload(b'1'),
    ]);

    let stats = TriggerLoop::new(source, mock_pipeline(opener.clone()), settings(output.clone()), token)
        .run()
        .unwrap();

    assert_eq!(stats.motion_events, 2);
    assert_eq!(stats.captures_failed, 2);
    assert_eq!(stats.captures_succeeded, 0);
    assert!(!output.exists());

    let log = opener.log();
    assert_eq!(log.opens, 2);
    assert_eq!(log.closes, 2);
}

#[test]
fn test_poll_error_is_fatal_but_notifies_inactive() {
    let (source, token) = scripted(vec![
        ScriptStep::Timeout,
        ScriptStep::PollError,
        ScriptStep::payload(b'1'),
    ]);
    let log = source.log_handle();
    let capturer = RecordingCapturer::default();
    let calls = Arc::clone(&capturer.calls);

    let result = TriggerLoop::new(source, capturer, settings(PathBuf::from("unused.jpg")), token.clone())
        .run();

    assert!(matches!(
        result,
        Err(MotionCamError::Sensor(SensorError::Poll { .. }))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!token.is_cancelled());

    let log = log.lock();
    assert_eq!(log.notifications, vec![true, false]);
    assert_eq!(log.closes, 1);
}

#[test]
fn test_interrupts_and_read_errors_are_recoverable() {
    let (source, token) = scripted(vec![
        ScriptStep::Interrupted,
        ScriptStep::ReadError,
        ScriptStep::Payload(Vec::new()),
        ScriptStep::Interrupted,
        ScriptStep::payload(b'1'),
    ]);
    let capturer = RecordingCapturer::default();
    let calls = Arc::clone(&capturer.calls);

    let stats = TriggerLoop::new(source, capturer, settings(PathBuf::from("out.jpg")), token)
        .run()
        .unwrap();

    assert_eq!(stats.interrupts, 2);
    assert_eq!(stats.read_errors, 2);
    assert_eq!(stats.motion_events, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_one_capture_per_payload_regardless_of_motion_bytes() {
    let (source, token) = scripted(vec![
        ScriptStep::Payload(vec![b'1'; 16]),
        ScriptStep::Payload(vec![b'1'; 16]),
    ]);
    let capturer = RecordingCapturer::default();
    let calls = Arc::clone(&capturer.calls);

    let stats = TriggerLoop::new(source, capturer, settings(PathBuf::from("out.jpg")), token)
        .run()
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.captures_succeeded, 2);
}

#[test]
fn test_failed_capture_counted() {
    let (source, token) = scripted(vec![ScriptStep::payload(b'1')]);
    let capturer = RecordingCapturer {
        fail: true,
        ..RecordingCapturer::default()
    };

    let stats = TriggerLoop::new(source, capturer, settings(PathBuf::from("out.jpg")), token)
        .run()
        .unwrap();

    assert_eq!(stats.captures_failed, 1);
    assert_eq!(stats.captures_succeeded, 0);
}

#[test]
fn test_cancelled_before_start() {
    let (source, token) = scripted(vec![ScriptStep::payload(b'1')]);
    let log = source.log_handle();
    token.cancel();

    let stats = TriggerLoop::new(
        source,
        RecordingCapturer::default(),
        settings(PathBuf::from("out.jpg")),
        token,
    )
    .run()
    .unwrap();

    assert_eq!(stats, TriggerStats::default());
    let log = log.lock();
    assert_eq!(log.notifications, vec![true, false]);
    assert_eq!(log.waits, 0);
    assert_eq!(log.closes, 1);
}

#[test]
fn test_shutdown_observed_within_poll_timeout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motion_sensor");
    let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

    let sensor = MotionSensor::open(path.to_str().unwrap()).unwrap();
    let token = CancellationToken::new();
    let poll_timeout = Duration::from_millis(500);
    let trigger = TriggerLoop::new(
        sensor,
        RecordingCapturer::default(),
        TriggerSettings {
            poll_timeout,
            payload_size: 16,
            output_path: dir.path().join("out.jpg"),
        },
        token.clone(),
    );

    let handle = std::thread::spawn(move || trigger.run());
    std::thread::sleep(Duration::from_millis(100));

    let cancelled_at = Instant::now();
    token.cancel();
    let stats = handle.join().unwrap().unwrap();

    assert!(cancelled_at.elapsed() < poll_timeout + Duration::from_millis(250));
    assert_eq!(stats.captures_succeeded, 0);
}

#[test]
fn test_stats_display() {
    let stats = TriggerStats {
        iterations: 10,
        motion_events: 2,
        captures_succeeded: 1,
        captures_failed: 1,
        ..TriggerStats::default()
    };
    let rendered = stats.to_string();
    assert!(rendered.starts_with("10 iterations"));
    assert!(rendered.contains("1/2 captures succeeded"));
}
