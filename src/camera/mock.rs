use super::device::{BufferDescriptor, DequeuedBuffer, DeviceOpener, NegotiatedFormat, VideoDevice};
use crate::error::CaptureError;
use crate::frame::{CaptureFormat, FieldOrder};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PAGE_SIZE: u64 = 4096;
const PADDING_BYTE: u8 = 0xEE;

/// Call a mock device should fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    SetFormat,
    RequestBuffers,
    /// Mapping of the buffer with this index
    Map(u32),
    Queue,
    StreamOn,
    StreamOff,
    Dequeue,
    DequeueTimeout,
}

/// Counters shared by every device a [`MockOpener`] hands out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCallLog {
    pub opens: usize,
    pub closes: usize,
    pub set_format: usize,
    pub request_buffers: usize,
    pub maps: usize,
    pub unmaps: usize,
    pub queues: usize,
    pub stream_on: usize,
    pub stream_off: usize,
    pub dequeues: usize,
    pub streaming: bool,
}

/// How a mock device responds
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Format the device substitutes for whatever is requested
    pub accepted: Option<CaptureFormat>,
    /// Extra bytes at the end of every row
    pub row_padding: u32,
    /// Buffers granted regardless of the requested count
    pub granted_buffers: Option<u32>,
    /// Buffer length reported instead of one full frame
    pub buffer_length: Option<usize>,
    pub failure: Option<FailurePoint>,
    pub open_fails: bool,
    /// Hand back a different index than the one queued
    pub dequeue_wrong_index: bool,
}

/// Opens [`MockVideoDevice`]s that all record into one [`DeviceCallLog`]
#[derive(Debug, Clone, Default)]
pub struct MockOpener {
    behavior: MockBehavior,
    log: Arc<Mutex<DeviceCallLog>>,
}

impl MockOpener {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            log: Arc::new(Mutex::new(DeviceCallLog::default())),
        }
    }

    pub fn failing_at(failure: FailurePoint) -> Self {
        Self::new(MockBehavior {
            failure: Some(failure),
            ..MockBehavior::default()
        })
    }

    /// Snapshot of the calls made so far
    pub fn log(&self) -> DeviceCallLog {
        self.log.lock().clone()
    }

    pub fn set_behavior(&mut self, behavior: MockBehavior) {
        self.behavior = behavior;
    }
}

impl DeviceOpener for MockOpener {
    type Device = MockVideoDevice;

    fn open(&self, path: &str) -> Result<MockVideoDevice, CaptureError> {
        if self.behavior.open_fails {
            return Err(CaptureError::DeviceUnavailable {
                device: path.to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }

        self.log.lock().opens += 1;
        debug!(device = path, "Opened mock capture device");

        Ok(MockVideoDevice {
            path: path.to_string(),
            behavior: self.behavior.clone(),
            log: Arc::clone(&self.log),
            format: None,
            queued: None,
            sequence: 0,
        })
    }
}

/// In-memory capture device producing a deterministic gradient frame
pub struct MockVideoDevice {
    path: String,
    behavior: MockBehavior,
    log: Arc<Mutex<DeviceCallLog>>,
    format: Option<NegotiatedFormat>,
    queued: Option<u32>,
    sequence: u32,
}

impl MockVideoDevice {
    fn fails_at(&self, point: FailurePoint) -> bool {
        self.behavior.failure == Some(point)
    }

    fn fill(&self, length: usize) -> Vec<u8> {
        let mut data = vec![PADDING_BYTE; length];
        let Some(format) = self.format else {
            return data;
        };

        let stride = format.bytes_per_line as usize;
        for y in 0..format.format.height as usize {
            for x in 0..format.format.width as usize {
                let offset = y * stride + x * 3;
                if offset + 3 > length {
                    return data;
                }
                data[offset] = (x % 256) as u8;
                data[offset + 1] = (y % 256) as u8;
                data[offset + 2] = ((x + y) % 256) as u8;
            }
        }
        data
    }
}

/// Heap stand-in for a DMA mapping
pub struct MockMapping {
    data: Vec<u8>,
    log: Arc<Mutex<DeviceCallLog>>,
}

impl AsRef<[u8]> for MockMapping {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        self.log.lock().unmaps += 1;
    }
}

impl VideoDevice for MockVideoDevice {
    type Mapping = MockMapping;

    fn path(&self) -> &str {
        &self.path
    }

    fn set_format(
        &mut self,
        requested: &CaptureFormat,
        _field: FieldOrder,
    ) -> Result<NegotiatedFormat, CaptureError> {
        self.log.lock().set_format += 1;
        if self.fails_at(FailurePoint::SetFormat) {
            return Err(CaptureError::FormatRejected {
                details: "mock device rejected the format".to_string(),
            });
        }

        let accepted = self.behavior.accepted.unwrap_or(*requested);
        let row = accepted.packed_row_bytes().unwrap_or(0) as u32;
        let bytes_per_line = row + self.behavior.row_padding;
        let negotiated = NegotiatedFormat {
            format: accepted,
            bytes_per_line,
            size_image: bytes_per_line * accepted.height,
        };

        self.format = Some(negotiated);
        Ok(negotiated)
    }

    fn request_buffers(&mut self, count: u32) -> Result<Vec<BufferDescriptor>, CaptureError> {
        self.log.lock().request_buffers += 1;
        if self.fails_at(FailurePoint::RequestBuffers) {
            return Err(CaptureError::NoBufferSupport {
                details: "mock device has no mmap support".to_string(),
            });
        }

        let granted = self.behavior.granted_buffers.unwrap_or(count);
        if granted == 0 {
            return Err(CaptureError::NoBufferSupport {
                details: "driver granted no buffers".to_string(),
            });
        }

        let frame_bytes = self.format.map(|f| f.size_image as usize).unwrap_or(0);
        let length = self.behavior.buffer_length.unwrap_or(frame_bytes);
        let stride = (length as u64).div_ceil(PAGE_SIZE) * PAGE_SIZE;

        Ok((0..granted)
            .map(|index| BufferDescriptor {
                index,
                length,
                offset: index as u64 * stride,
            })
            .collect())
    }

    fn map_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<MockMapping, CaptureError> {
        if self.fails_at(FailurePoint::Map(descriptor.index)) {
            return Err(CaptureError::MapFailed {
                index: descriptor.index,
                source: io::Error::from_raw_os_error(libc::ENOMEM),
            });
        }

        self.log.lock().maps += 1;
        Ok(MockMapping {
            data: self.fill(descriptor.length),
            log: Arc::clone(&self.log),
        })
    }

    fn queue_buffer(&mut self, index: u32) -> Result<(), CaptureError> {
        self.log.lock().queues += 1;
        if self.fails_at(FailurePoint::Queue) {
            return Err(CaptureError::QueueFailed {
                index,
                details: "mock device refused the buffer".to_string(),
            });
        }

        self.queued = Some(index);
        Ok(())
    }

    fn set_streaming(&mut self, on: bool) -> Result<(), CaptureError> {
        let mut log = self.log.lock();
        if on {
            log.stream_on += 1;
            if self.fails_at(FailurePoint::StreamOn) {
                return Err(CaptureError::StreamToggleFailed {
                    enable: true,
                    details: "mock device failed to start".to_string(),
                });
            }
            log.streaming = true;
        } else {
            log.stream_off += 1;
            if self.fails_at(FailurePoint::StreamOff) {
                return Err(CaptureError::StreamToggleFailed {
                    enable: false,
                    details: "mock device failed to stop".to_string(),
                });
            }
            log.streaming = false;
            self.queued = None;
        }
        Ok(())
    }

    fn dequeue_buffer(&mut self, timeout: Duration) -> Result<DequeuedBuffer, CaptureError> {
        let streaming = {
            let mut log = self.log.lock();
            log.dequeues += 1;
            log.streaming
        };

        if self.fails_at(FailurePoint::DequeueTimeout) {
            return Err(CaptureError::DequeueTimeout { timeout });
        }
        if self.fails_at(FailurePoint::Dequeue) {
            return Err(CaptureError::DequeueFailed {
                details: "mock device I/O error".to_string(),
            });
        }
        if !streaming {
            return Err(CaptureError::DequeueFailed {
                details: "device is not streaming".to_string(),
            });
        }

        let index = self.queued.take().ok_or_else(|| CaptureError::DequeueFailed {
            details: "no buffer queued".to_string(),
        })?;

        self.sequence += 1;
        Ok(DequeuedBuffer {
            index: if self.behavior.dequeue_wrong_index {
                index + 1
            } else {
                index
            },
            bytes_used: self.format.map(|f| f.size_image as usize).unwrap_or(0),
            sequence: self.sequence,
        })
    }
}

impl Drop for MockVideoDevice {
    fn drop(&mut self) {
        self.log.lock().closes += 1;
    }
}
