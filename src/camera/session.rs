use super::buffers::BufferPool;
use super::device::{NegotiatedFormat, VideoDevice};
use crate::error::CaptureError;
use crate::frame::{CaptureFormat, FieldOrder};
use tracing::{debug, warn};

/// Scoped ownership of an open capture device and its mapped buffers.
///
/// Teardown turns streaming off (if it was ever requested), unmaps every
/// buffer and closes the device. It runs exactly once, either through
/// [`CaptureSession::teardown`] or when the session is dropped.
pub struct CaptureSession<D: VideoDevice> {
    device: Option<D>,
    pool: BufferPool<D::Mapping>,
    stream_requested: bool,
}

impl<D: VideoDevice> CaptureSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Some(device),
            pool: BufferPool::empty(),
            stream_requested: false,
        }
    }

    /// Request `requested` and check what the driver settled on.
    ///
    /// A different pixel layout always fails. A different resolution is
    /// carried forward when `allow_resolution_change` is set and fails
    /// otherwise. The returned stride is never smaller than one packed row.
    pub fn negotiate(
        &mut self,
        requested: &CaptureFormat,
        field: FieldOrder,
        allow_resolution_change: bool,
    ) -> Result<NegotiatedFormat, CaptureError> {
        let negotiated = self.device_mut("negotiate")?.set_format(requested, field)?;
        validate_negotiated(requested, negotiated, allow_resolution_change)
    }

    /// Request `count` buffers and map them; each must hold one full frame of `format`
    pub fn allocate(&mut self, count: u32, format: &NegotiatedFormat) -> Result<(), CaptureError> {
        let device = self.device_mut("allocate")?;
        let descriptors = device.request_buffers(count)?;
        let pool = BufferPool::map(device, &descriptors)?;
        self.pool = pool;

        let required = format.bytes_per_line as usize * format.format.height as usize;
        if let Some(short) = self.pool.iter().find(|buffer| buffer.len() < required) {
            return Err(CaptureError::BufferTooSmall {
                index: short.index(),
                length: short.len(),
                required,
            });
        }

        Ok(())
    }

    pub fn pool(&self) -> &BufferPool<D::Mapping> {
        &self.pool
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub(crate) fn device_mut(&mut self, operation: &'static str) -> Result<&mut D, CaptureError> {
        self.device
            .as_mut()
            .ok_or(CaptureError::InvalidTransition {
                state: "closed",
                operation,
            })
    }

    /// Streaming may be partially on from here until teardown
    pub(crate) fn mark_stream_requested(&mut self) {
        self.stream_requested = true;
    }

    /// Stop streaming, unmap buffers and close the device. Idempotent.
    pub fn teardown(&mut self) {
        let Some(mut device) = self.device.take() else {
            return;
        };

        if self.stream_requested {
            if let Err(e) = device.set_streaming(false) {
                warn!("Failed to stop streaming on {}: {}", device.path(), e);
            }
            self.stream_requested = false;
        }

        self.pool.release();
        debug!("Capture session on {} closed", device.path());
    }
}

impl<D: VideoDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn validate_negotiated(
    requested: &CaptureFormat,
    mut negotiated: NegotiatedFormat,
    allow_resolution_change: bool,
) -> Result<NegotiatedFormat, CaptureError> {
    let accepted = negotiated.format;

    if accepted.pixel_format != requested.pixel_format {
        return Err(CaptureError::FormatMismatch {
            requested: requested.to_string(),
            accepted: accepted.to_string(),
        });
    }

    if accepted.width == 0 || accepted.height == 0 {
        return Err(CaptureError::FormatRejected {
            details: format!("driver reported an empty frame size ({})", accepted),
        });
    }

    if (accepted.width, accepted.height) != (requested.width, requested.height) {
        if !allow_resolution_change {
            return Err(CaptureError::FormatMismatch {
                requested: requested.to_string(),
                accepted: accepted.to_string(),
            });
        }
        warn!(
            "Device substituted {}x{} for requested {}x{}",
            accepted.width, accepted.height, requested.width, requested.height
        );
    }

    let row = accepted
        .packed_row_bytes()
        .ok_or_else(|| CaptureError::FormatRejected {
            details: format!("{} is not a packed pixel format", accepted.pixel_format),
        })?;

    if negotiated.bytes_per_line == 0 {
        negotiated.bytes_per_line = row as u32;
    }

    if (negotiated.bytes_per_line as usize) < row {
        return Err(CaptureError::FormatRejected {
            details: format!(
                "stride {} is shorter than a {} byte row",
                negotiated.bytes_per_line, row
            ),
        });
    }

    Ok(negotiated)
}
