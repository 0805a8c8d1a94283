use super::*;
use crate::error::SensorError;
use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn make_fifo(path: &Path) {
    let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
    let result = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    assert_eq!(result, 0, "mkfifo failed: {}", std::io::Error::last_os_error());
}

#[test]
fn test_poll_events_classification() {
    use super::device::readiness_from_revents;

    assert_eq!(
        readiness_from_revents(libc::POLLIN).unwrap(),
        Some(Readiness::Readable)
    );
    // Queued data is still read before the hangup is noticed
    assert_eq!(
        readiness_from_revents(libc::POLLIN | libc::POLLHUP).unwrap(),
        Some(Readiness::Readable)
    );
    assert_eq!(readiness_from_revents(libc::POLLHUP).unwrap(), None);

    for revents in [libc::POLLERR, libc::POLLNVAL] {
        match readiness_from_revents(revents) {
            Err(e @ SensorError::Poll { .. }) => assert!(!e.is_interrupted()),
            other => panic!("Unexpected classification: {:?}", other),
        }
    }
}

#[test]
fn test_trigger_event_classification() {
    let mut buffer = [b'0'; 16];
    assert_eq!(TriggerEvent::from_read(&buffer, 16).kind, TriggerKind::NoMotion);

    buffer[0] = MOTION_SENTINEL;
    let event = TriggerEvent::from_read(&buffer, 16);
    assert!(event.is_motion());
    assert_eq!(event.payload.len(), 16);

    // Only the first byte counts
    buffer[0] = b'0';
    buffer[1] = MOTION_SENTINEL;
    assert!(!TriggerEvent::from_read(&buffer, 16).is_motion());

    assert_eq!(TriggerEvent::from_read(&buffer, 0).kind, TriggerKind::Error);
    assert_eq!(TriggerEvent::from_read(&[b'1'], 1).kind, TriggerKind::Motion);
}

#[test]
fn test_open_missing_sensor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motion_sensor");

    match MotionSensor::open(path.to_str().unwrap()) {
        Err(SensorError::DeviceNotFound(device)) => assert!(device.ends_with("motion_sensor")),
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Opening a missing sensor should fail"),
    }
}

#[test]
fn test_fifo_backed_sensor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motion_sensor");
    make_fifo(&path);

    let mut sensor = MotionSensor::open(path.to_str().unwrap()).unwrap();
    assert_eq!(
        sensor.wait_readable(Duration::from_millis(20)).unwrap(),
        Readiness::TimedOut
    );

    let mut producer = OpenOptions::new().write(true).open(&path).unwrap();
    producer.write_all(b"1000000000000000").unwrap();

    assert_eq!(
        sensor.wait_readable(Duration::from_millis(500)).unwrap(),
        Readiness::Readable
    );
    let mut buffer = [0u8; 16];
    let read = sensor.read_payload(&mut buffer).unwrap();
    assert_eq!(read, 16);
    assert!(TriggerEvent::from_read(&buffer, read).is_motion());

    // The consumer notification is one native-endian int
    sensor.set_consumer_active(true).unwrap();
    let mut state = [0u8; 4];
    assert_eq!(sensor.read_payload(&mut state).unwrap(), 4);
    assert_eq!(i32::from_ne_bytes(state), 1);

    sensor.set_consumer_active(false).unwrap();
    assert_eq!(sensor.read_payload(&mut state).unwrap(), 4);
    assert_eq!(i32::from_ne_bytes(state), 0);
}

#[test]
fn test_sensor_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motion_sensor");
    make_fifo(&path);

    let mut sensor = MotionSensor::open(path.to_str().unwrap()).unwrap();
    sensor.close().unwrap();
    sensor.close().unwrap();
    assert!(!sensor.is_open());

    assert!(matches!(
        sensor.wait_readable(Duration::from_millis(1)),
        Err(SensorError::Closed)
    ));
    assert!(matches!(
        sensor.set_consumer_active(false),
        Err(SensorError::Closed)
    ));
}

#[test]
fn test_scripted_source_replays_script() {
    let mut source = ScriptedEventSource::new([
        ScriptStep::Timeout,
        ScriptStep::Interrupted,
        ScriptStep::payload(b'1'),
        ScriptStep::ReadError,
        ScriptStep::PollError,
    ]);
    let timeout = Duration::from_millis(1);
    let mut buffer = [0u8; 16];

    assert_eq!(source.wait_readable(timeout).unwrap(), Readiness::TimedOut);
    assert_eq!(source.wait_readable(timeout).unwrap(), Readiness::Interrupted);
    assert_eq!(source.wait_readable(timeout).unwrap(), Readiness::Readable);
    assert_eq!(source.read_payload(&mut buffer).unwrap(), 16);
    assert_eq!(buffer[0], b'1');
    assert_eq!(source.wait_readable(timeout).unwrap(), Readiness::Readable);
    assert!(matches!(
        source.read_payload(&mut buffer),
        Err(SensorError::Read { .. })
    ));

    let err = source.wait_readable(timeout).unwrap_err();
    assert!(matches!(err, SensorError::Poll { .. }));
    assert!(!err.is_interrupted());
}

#[test]
fn test_scripted_source_cancels_when_exhausted() {
    let token = CancellationToken::new();
    let mut source = ScriptedEventSource::new([ScriptStep::Timeout]).cancel_when_done(token.clone());
    let log = source.log_handle();

    source.wait_readable(Duration::from_millis(1)).unwrap();
    assert!(!token.is_cancelled());

    assert_eq!(
        source.wait_readable(Duration::from_millis(1)).unwrap(),
        Readiness::TimedOut
    );
    assert!(token.is_cancelled());

    source.close().unwrap();
    source.close().unwrap();
    assert_eq!(log.lock().closes, 1);
    assert_eq!(log.lock().waits, 2);
}
