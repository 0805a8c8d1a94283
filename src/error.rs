use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("System error: {message}")]
    System { message: String },
}

impl MotionCamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Failures of a single capture attempt. None of these terminate the trigger loop.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture device {device} unavailable: {source}")]
    DeviceUnavailable {
        device: String,
        source: std::io::Error,
    },

    #[error("Format rejected by device: {details}")]
    FormatRejected { details: String },

    #[error("Device accepted {accepted} instead of requested {requested}")]
    FormatMismatch { requested: String, accepted: String },

    #[error("Memory-mapped buffers not supported: {details}")]
    NoBufferSupport { details: String },

    #[error("Failed to map buffer {index}: {source}")]
    MapFailed {
        index: u32,
        source: std::io::Error,
    },

    #[error("Buffer {index} holds {length} bytes but a frame needs {required}")]
    BufferTooSmall {
        index: u32,
        length: usize,
        required: usize,
    },

    #[error("Failed to queue buffer {index}: {details}")]
    QueueFailed { index: u32, details: String },

    #[error("Failed to turn streaming {}: {details}", switch_name(.enable))]
    StreamToggleFailed { enable: bool, details: String },

    #[error("No frame dequeued within {timeout:?}")]
    DequeueTimeout { timeout: Duration },

    #[error("Failed to dequeue buffer: {details}")]
    DequeueFailed { details: String },

    #[error("Cannot {operation} while acquisition is {state}")]
    InvalidTransition {
        state: &'static str,
        operation: &'static str,
    },

    #[error("Frame carries {actual} bytes, expected {expected}")]
    ShortFrame { expected: usize, actual: usize },

    #[error("Failed to encode {path}: {details}")]
    Encode { path: String, details: String },

    #[error("Failed to write {path}: {source}")]
    EncodeIo {
        path: String,
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Pipeline step the error belongs to, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            CaptureError::DeviceUnavailable { .. } => "open",
            CaptureError::FormatRejected { .. } | CaptureError::FormatMismatch { .. } => {
                "negotiate"
            }
            CaptureError::NoBufferSupport { .. } => "request_buffers",
            CaptureError::MapFailed { .. } | CaptureError::BufferTooSmall { .. } => "map",
            CaptureError::QueueFailed { .. } => "queue",
            CaptureError::StreamToggleFailed { .. } => "stream",
            CaptureError::DequeueTimeout { .. }
            | CaptureError::DequeueFailed { .. }
            | CaptureError::ShortFrame { .. } => "dequeue",
            CaptureError::InvalidTransition { .. } => "acquire",
            CaptureError::Encode { .. } | CaptureError::EncodeIo { .. } => "encode",
        }
    }
}

#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Sensor device not found: {0}")]
    DeviceNotFound(String),

    #[error("Permission denied for sensor device: {0}")]
    PermissionDenied(String),

    #[error("Failed to open sensor device {device}: {source}")]
    DeviceOpen {
        device: String,
        source: std::io::Error,
    },

    #[error("Poll error: {source}")]
    Poll { source: std::io::Error },

    #[error("Error reading from sensor: {source}")]
    Read { source: std::io::Error },

    #[error("Error setting consumer state: {source}")]
    Notify { source: std::io::Error },

    #[error("Sensor handle already closed")]
    Closed,
}

impl SensorError {
    pub fn is_interrupted(&self) -> bool {
        match self {
            SensorError::Poll { source }
            | SensorError::Read { source }
            | SensorError::Notify { source } => {
                source.kind() == std::io::ErrorKind::Interrupted
            }
            _ => false,
        }
    }

    pub(crate) fn from_open(device: &str, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => SensorError::DeviceNotFound(device.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                SensorError::PermissionDenied(device.to_string())
            }
            _ => SensorError::DeviceOpen {
                device: device.to_string(),
                source: error,
            },
        }
    }
}

fn switch_name(enable: &bool) -> &'static str {
    if *enable {
        "on"
    } else {
        "off"
    }
}

pub type Result<T> = std::result::Result<T, MotionCamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_interrupted_classification() {
        let interrupted = SensorError::Poll {
            source: io::Error::from(io::ErrorKind::Interrupted),
        };
        assert!(interrupted.is_interrupted());

        let fatal = SensorError::Poll {
            source: io::Error::from_raw_os_error(libc::EBADF),
        };
        assert!(!fatal.is_interrupted());
        assert!(!SensorError::Closed.is_interrupted());
    }

    #[test]
    fn test_open_error_mapping() {
        let missing = SensorError::from_open("/dev/nope", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, SensorError::DeviceNotFound(ref d) if d == "/dev/nope"));

        let denied = SensorError::from_open(
            "/dev/motion_sensor",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(denied, SensorError::PermissionDenied(_)));
    }

    #[test]
    fn test_capture_error_stage_and_message() {
        let err = CaptureError::StreamToggleFailed {
            enable: true,
            details: "EINVAL".to_string(),
        };
        assert_eq!(err.stage(), "stream");
        assert_eq!(err.to_string(), "Failed to turn streaming on: EINVAL");

        let err = CaptureError::DequeueTimeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.stage(), "dequeue");
    }
}
