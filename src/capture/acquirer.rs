use crate::camera::{CaptureSession, DequeuedBuffer, NegotiatedFormat, VideoDevice};
use crate::error::CaptureError;
use crate::frame::RawFrame;
use std::time::Duration;
use tracing::{debug, trace};

/// Where a single-frame acquisition stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Idle,
    Queued { index: u32 },
    Streaming { index: u32 },
    Complete(DequeuedBuffer),
    Failed,
}

impl AcquisitionState {
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionState::Idle => "idle",
            AcquisitionState::Queued { .. } => "queued",
            AcquisitionState::Streaming { .. } => "streaming",
            AcquisitionState::Complete(_) => "complete",
            AcquisitionState::Failed => "failed",
        }
    }
}

/// Drives one buffer through queue, stream-on and dequeue.
///
/// Steps must run in order; calling one out of order returns
/// [`CaptureError::InvalidTransition`] without touching the device. Any
/// device error moves the acquirer to `Failed`, after which only the
/// owning session's teardown remains.
pub struct FrameAcquirer<'a, D: VideoDevice> {
    session: &'a mut CaptureSession<D>,
    format: NegotiatedFormat,
    dequeue_timeout: Duration,
    state: AcquisitionState,
}

impl<'a, D: VideoDevice> FrameAcquirer<'a, D> {
    pub fn new(
        session: &'a mut CaptureSession<D>,
        format: NegotiatedFormat,
        dequeue_timeout: Duration,
    ) -> Self {
        Self {
            session,
            format,
            dequeue_timeout,
            state: AcquisitionState::Idle,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Hand mapped buffer `index` to the device
    pub fn queue(&mut self, index: u32) -> Result<(), CaptureError> {
        if self.state != AcquisitionState::Idle {
            return Err(self.invalid("queue"));
        }

        if self.session.pool().get(index).is_none() {
            return self.fail(CaptureError::QueueFailed {
                index,
                details: "buffer is not mapped".to_string(),
            });
        }

        let result = self
            .session
            .device_mut("queue")
            .and_then(|device| device.queue_buffer(index));
        self.advance(result, AcquisitionState::Queued { index })?;
        trace!(index, "Buffer queued");
        Ok(())
    }

    pub fn stream_on(&mut self) -> Result<(), CaptureError> {
        let AcquisitionState::Queued { index } = self.state else {
            return Err(self.invalid("start streaming"));
        };

        self.session.mark_stream_requested();
        let result = self
            .session
            .device_mut("start streaming")
            .and_then(|device| device.set_streaming(true));
        self.advance(result, AcquisitionState::Streaming { index })?;
        trace!("Streaming started");
        Ok(())
    }

    /// Wait for the queued buffer to come back filled
    pub fn dequeue(&mut self) -> Result<DequeuedBuffer, CaptureError> {
        let AcquisitionState::Streaming { index } = self.state else {
            return Err(self.invalid("dequeue"));
        };

        let timeout = self.dequeue_timeout;
        let result = self
            .session
            .device_mut("dequeue")
            .and_then(|device| device.dequeue_buffer(timeout))
            .and_then(|buffer| {
                if buffer.index == index {
                    Ok(buffer)
                } else {
                    Err(CaptureError::DequeueFailed {
                        details: format!(
                            "driver returned buffer {}, expected {}",
                            buffer.index, index
                        ),
                    })
                }
            });

        match result {
            Ok(buffer) => {
                self.state = AcquisitionState::Complete(buffer);
                debug!(
                    index = buffer.index,
                    bytes_used = buffer.bytes_used,
                    sequence = buffer.sequence,
                    "Frame dequeued"
                );
                Ok(buffer)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Copy the dequeued frame out of its mapping, dropping row padding
    pub fn frame(&self) -> Result<RawFrame, CaptureError> {
        let AcquisitionState::Complete(buffer) = self.state else {
            return Err(self.invalid("read frame"));
        };

        let mapped = self
            .session
            .pool()
            .get(buffer.index)
            .ok_or_else(|| CaptureError::DequeueFailed {
                details: format!("buffer {} is no longer mapped", buffer.index),
            })?;

        let format = self.format.format;
        let row = format
            .packed_row_bytes()
            .ok_or_else(|| CaptureError::FormatRejected {
                details: format!("{} is not a packed pixel format", format.pixel_format),
            })?;
        let stride = (self.format.bytes_per_line as usize).max(row);
        let height = format.height as usize;

        let bytes = mapped.as_slice();
        let available = if buffer.bytes_used == 0 {
            bytes.len()
        } else {
            buffer.bytes_used.min(bytes.len())
        };
        let required = stride * height.saturating_sub(1) + row;
        if height == 0 || available < required {
            return Err(CaptureError::ShortFrame {
                expected: required,
                actual: available,
            });
        }

        let mut data = Vec::with_capacity(row * height);
        for line in bytes[..available].chunks(stride).take(height) {
            data.extend_from_slice(&line[..row]);
        }

        Ok(RawFrame::new(buffer.sequence, data, format))
    }

    /// Run every step for buffer `index` and return the frame
    pub fn acquire(mut self, index: u32) -> Result<RawFrame, CaptureError> {
        self.queue(index)?;
        self.stream_on()?;
        self.dequeue()?;
        self.frame()
    }

    fn invalid(&self, operation: &'static str) -> CaptureError {
        CaptureError::InvalidTransition {
            state: self.state.name(),
            operation,
        }
    }

    fn advance(
        &mut self,
        result: Result<(), CaptureError>,
        next: AcquisitionState,
    ) -> Result<(), CaptureError> {
        match result {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail<T>(&mut self, error: CaptureError) -> Result<T, CaptureError> {
        self.state = AcquisitionState::Failed;
        Err(error)
    }
}
