use crate::error::CaptureError;
use crate::frame::{CaptureFormat, FieldOrder};
use std::time::Duration;

/// Format the device actually accepted during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub format: CaptureFormat,
    /// Row stride in bytes, including driver padding
    pub bytes_per_line: u32,
    /// Bytes the driver needs per frame
    pub size_image: u32,
}

/// Kernel-side buffer allocated for memory-mapped I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub index: u32,
    pub length: usize,
    /// Mapping token passed to mmap
    pub offset: u64,
}

/// Buffer handed back to software by a dequeue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeuedBuffer {
    pub index: u32,
    pub bytes_used: usize,
    pub sequence: u32,
}

/// Capabilities a streaming capture endpoint exposes.
///
/// Dropping the device closes its handle. Dropping a `Mapping` unmaps it.
pub trait VideoDevice {
    type Mapping: AsRef<[u8]>;

    /// Path the device was opened from
    fn path(&self) -> &str;

    /// Request `requested`; the returned format is what the driver settled on
    fn set_format(
        &mut self,
        requested: &CaptureFormat,
        field: FieldOrder,
    ) -> Result<NegotiatedFormat, CaptureError>;

    /// Allocate `count` memory-mapped buffers and describe each one
    fn request_buffers(&mut self, count: u32) -> Result<Vec<BufferDescriptor>, CaptureError>;

    /// Map one buffer into this process, shared read/write
    fn map_buffer(&mut self, descriptor: &BufferDescriptor)
        -> Result<Self::Mapping, CaptureError>;

    /// Hand buffer `index` to the hardware
    fn queue_buffer(&mut self, index: u32) -> Result<(), CaptureError>;

    fn set_streaming(&mut self, on: bool) -> Result<(), CaptureError>;

    /// Wait up to `timeout` for a filled buffer and take it back
    fn dequeue_buffer(&mut self, timeout: Duration) -> Result<DequeuedBuffer, CaptureError>;
}

/// Opens capture devices by path
pub trait DeviceOpener {
    type Device: VideoDevice;

    fn open(&self, path: &str) -> Result<Self::Device, CaptureError>;
}
