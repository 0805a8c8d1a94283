mod acquirer;
mod encode;
mod pipeline;

pub use acquirer::{AcquisitionState, FrameAcquirer};
pub use encode::ImageEncoder;
pub use pipeline::{CapturePipeline, CaptureReport, CaptureSettings, FrameCapturer};
