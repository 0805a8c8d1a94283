pub mod app;
pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod sensor;
pub mod trigger;

pub use app::{Component, ComponentState, MotionCamOrchestrator, ShutdownReason};
pub use camera::{CaptureSession, DeviceOpener, V4l2Opener, VideoDevice};
pub use capture::{CapturePipeline, CaptureReport, FrameAcquirer, FrameCapturer, ImageEncoder};
pub use config::MotionCamConfig;
pub use error::{CaptureError, MotionCamError, Result, SensorError};
pub use frame::{CaptureFormat, FieldOrder, PixelFormat, RawFrame};
pub use sensor::{EventSource, MotionSensor, TriggerEvent};
pub use trigger::{TriggerLoop, TriggerStats};
