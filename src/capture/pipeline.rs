use super::acquirer::FrameAcquirer;
use super::encode::ImageEncoder;
use crate::camera::{CaptureSession, DeviceOpener, VideoDevice};
use crate::config::{CameraConfig, CaptureConfig, MotionCamConfig};
use crate::error::CaptureError;
use crate::frame::{CaptureFormat, FieldOrder, RawFrame};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Anything that can turn "take a picture" into a file on disk.
///
/// `capture` takes `&mut self`, so a capturer never runs two attempts at once.
pub trait FrameCapturer {
    fn capture(&mut self, output: &Path) -> Result<CaptureReport, CaptureError>;
}

/// Outcome of a successful capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Device parameters for one capture attempt
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub device: String,
    pub requested: CaptureFormat,
    pub field: FieldOrder,
    pub buffer_count: u32,
    pub dequeue_timeout: Duration,
    pub allow_resolution_change: bool,
}

impl CaptureSettings {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            device: config.device.clone(),
            requested: config.requested_format(),
            field: config.field,
            buffer_count: config.buffer_count,
            dequeue_timeout: config.dequeue_timeout(),
            allow_resolution_change: config.allow_resolution_change,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from_config(&MotionCamConfig::default().camera)
    }
}

/// Opens the device for every attempt, acquires one frame, releases the
/// device and then encodes. Nothing is held between attempts.
pub struct CapturePipeline<O: DeviceOpener> {
    opener: O,
    settings: CaptureSettings,
    encoder: ImageEncoder,
}

impl<O: DeviceOpener> CapturePipeline<O> {
    pub fn new(opener: O, settings: CaptureSettings, encoder: ImageEncoder) -> Self {
        Self {
            opener,
            settings,
            encoder,
        }
    }

    pub fn from_config(opener: O, camera: &CameraConfig, capture: &CaptureConfig) -> Self {
        Self::new(
            opener,
            CaptureSettings::from_config(camera),
            ImageEncoder::new(capture.jpeg_quality),
        )
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Open and immediately close the device to check it exists
    pub fn probe(&self) -> Result<(), CaptureError> {
        let device = self.opener.open(&self.settings.device)?;
        drop(device);
        debug!(device = %self.settings.device, "Capture device probe succeeded");
        Ok(())
    }

    /// Acquire one frame; the device is closed again before this returns
    pub fn acquire_frame(&self) -> Result<RawFrame, CaptureError> {
        let settings = &self.settings;
        let mut session = CaptureSession::new(self.opener.open(&settings.device)?);

        let result = acquire_in(&mut session, settings);
        session.teardown();
        result
    }
}

fn acquire_in<D: VideoDevice>(
    session: &mut CaptureSession<D>,
    settings: &CaptureSettings,
) -> Result<RawFrame, CaptureError> {
    let negotiated = session.negotiate(
        &settings.requested,
        settings.field,
        settings.allow_resolution_change,
    )?;
    session.allocate(settings.buffer_count, &negotiated)?;
    FrameAcquirer::new(session, negotiated, settings.dequeue_timeout).acquire(0)
}

impl<O: DeviceOpener> FrameCapturer for CapturePipeline<O> {
    fn capture(&mut self, output: &Path) -> Result<CaptureReport, CaptureError> {
        let started = Instant::now();

        let frame = self.acquire_frame()?;
        let bytes_written = self.encoder.encode(&frame, output)?;

        let report = CaptureReport {
            path: output.to_path_buf(),
            width: frame.width,
            height: frame.height,
            bytes_written,
            elapsed: started.elapsed(),
        };
        debug!(
            "Captured {}x{} frame ({} bytes) in {:?}",
            report.width, report.height, report.bytes_written, report.elapsed
        );
        Ok(report)
    }
}
