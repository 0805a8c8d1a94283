mod buffers;
mod device;
pub mod mock;
mod session;
pub mod v4l2;

pub use buffers::{BufferPool, MappedBuffer};
pub use device::{BufferDescriptor, DequeuedBuffer, DeviceOpener, NegotiatedFormat, VideoDevice};
pub use mock::{DeviceCallLog, FailurePoint, MockBehavior, MockOpener, MockVideoDevice};
pub use session::CaptureSession;
pub use v4l2::{V4l2Device, V4l2Opener};
