//! V4L2 capture device built on the `v4l` crate
//!
//! Only the single-planar video capture path with memory-mapped buffers is
//! covered. Format negotiation goes through `v4l::video::Capture`; the
//! buffer steps are issued one at a time through the crate's ioctl wrapper
//! so each of them can fail and be torn down on its own.

use super::device::{BufferDescriptor, DequeuedBuffer, DeviceOpener, NegotiatedFormat, VideoDevice};
use crate::error::CaptureError;
use crate::frame::{CaptureFormat, FieldOrder, PixelFormat};
use memmap2::{MmapMut, MmapOptions};
use std::io;
use std::os::raw::{c_int, c_void};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use v4l::buffer::Type;
use v4l::format::FieldOrder as V4lFieldOrder;
use v4l::memory::Memory;
use v4l::v4l2::{self, vidioc};
use v4l::v4l_sys::{v4l2_buffer, v4l2_requestbuffers};
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Retry an ioctl interrupted by a signal
fn retry_eintr(mut call: impl FnMut() -> io::Result<()>) -> io::Result<()> {
    loop {
        match call() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn capture_buffer(index: u32) -> v4l2_buffer {
    let mut buf: v4l2_buffer = unsafe { std::mem::zeroed() };
    buf.index = index;
    buf.type_ = Type::VideoCapture as u32;
    buf.memory = Memory::Mmap as u32;
    buf
}

pub(crate) fn field_order(field: FieldOrder) -> V4lFieldOrder {
    match field {
        FieldOrder::Any => V4lFieldOrder::Any,
        FieldOrder::None => V4lFieldOrder::Progressive,
        FieldOrder::Interlaced => V4lFieldOrder::Interlaced,
    }
}

/// Format sent with VIDIOC_S_FMT
pub(crate) fn requested_format(requested: &CaptureFormat, field: FieldOrder) -> Format {
    let mut format = Format::new(
        requested.width,
        requested.height,
        FourCC::from(requested.pixel_format.fourcc()),
    );
    format.field_order = field_order(field);
    format
}

/// What the driver wrote back, in crate terms
pub(crate) fn negotiated_format(accepted: &Format) -> NegotiatedFormat {
    NegotiatedFormat {
        format: CaptureFormat {
            width: accepted.width,
            height: accepted.height,
            pixel_format: PixelFormat::from_fourcc(u32::from(accepted.fourcc)),
        },
        bytes_per_line: accepted.stride,
        size_image: accepted.size,
    }
}

/// Opens `/dev/video*` nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct V4l2Opener;

impl DeviceOpener for V4l2Opener {
    type Device = V4l2Device;

    fn open(&self, path: &str) -> Result<V4l2Device, CaptureError> {
        V4l2Device::open(path)
    }
}

/// Open handle to a V4L2 capture node
pub struct V4l2Device {
    device: Device,
    path: String,
}

impl V4l2Device {
    pub fn open(path: &str) -> Result<Self, CaptureError> {
        let device = Device::with_path(path).map_err(|source| CaptureError::DeviceUnavailable {
            device: path.to_string(),
            source,
        })?;

        debug!(device = path, "Opened capture device");
        Ok(Self {
            device,
            path: path.to_string(),
        })
    }

    fn fd(&self) -> c_int {
        self.device.handle().fd()
    }

    /// Wait for the device to signal a filled buffer
    fn wait_for_frame(&self, timeout: Duration) -> Result<(), CaptureError> {
        let deadline = Instant::now() + timeout;
        let handle = self.device.handle();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let millis = remaining.as_millis().min(c_int::MAX as u128) as c_int;

            match handle.poll(libc::POLLIN, millis) {
                Ok(0) => return Err(CaptureError::DequeueTimeout { timeout }),
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CaptureError::DequeueFailed {
                        details: format!("poll: {}", e),
                    })
                }
            }
        }
    }
}

impl VideoDevice for V4l2Device {
    type Mapping = MmapMut;

    fn path(&self) -> &str {
        &self.path
    }

    fn set_format(
        &mut self,
        requested: &CaptureFormat,
        field: FieldOrder,
    ) -> Result<NegotiatedFormat, CaptureError> {
        let accepted = self
            .device
            .set_format(&requested_format(requested, field))
            .map_err(|e| CaptureError::FormatRejected {
                details: format!("VIDIOC_S_FMT {}: {}", requested, e),
            })?;

        let negotiated = negotiated_format(&accepted);
        debug!(
            device = %self.path,
            accepted = %negotiated.format,
            bytes_per_line = negotiated.bytes_per_line,
            "Format negotiated"
        );
        Ok(negotiated)
    }

    fn request_buffers(&mut self, count: u32) -> Result<Vec<BufferDescriptor>, CaptureError> {
        let mut req: v4l2_requestbuffers = unsafe { std::mem::zeroed() };
        req.count = count;
        req.type_ = Type::VideoCapture as u32;
        req.memory = Memory::Mmap as u32;

        let fd = self.fd();
        retry_eintr(|| unsafe {
            v4l2::ioctl(fd, vidioc::VIDIOC_REQBUFS, &mut req as *mut _ as *mut c_void)
        })
        .map_err(|e| CaptureError::NoBufferSupport {
            details: format!("VIDIOC_REQBUFS: {}", e),
        })?;

        if req.count == 0 {
            return Err(CaptureError::NoBufferSupport {
                details: "driver granted no buffers".to_string(),
            });
        }

        if req.count < count {
            warn!(
                "Driver granted {} of {} requested buffers",
                req.count, count
            );
        }

        let mut descriptors = Vec::with_capacity(req.count.min(count) as usize);
        for index in 0..req.count.min(count) {
            let mut buf = capture_buffer(index);
            retry_eintr(|| unsafe {
                v4l2::ioctl(fd, vidioc::VIDIOC_QUERYBUF, &mut buf as *mut _ as *mut c_void)
            })
            .map_err(|e| CaptureError::NoBufferSupport {
                details: format!("VIDIOC_QUERYBUF {}: {}", index, e),
            })?;

            descriptors.push(BufferDescriptor {
                index,
                length: buf.length as usize,
                offset: unsafe { buf.m.offset } as u64,
            });
        }

        Ok(descriptors)
    }

    fn map_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<MmapMut, CaptureError> {
        let mapping = unsafe {
            MmapOptions::new()
                .offset(descriptor.offset)
                .len(descriptor.length)
                .map_mut(self.fd())
        }
        .map_err(|source| CaptureError::MapFailed {
            index: descriptor.index,
            source,
        })?;

        trace!(
            index = descriptor.index,
            length = descriptor.length,
            "Mapped capture buffer"
        );
        Ok(mapping)
    }

    fn queue_buffer(&mut self, index: u32) -> Result<(), CaptureError> {
        let mut buf = capture_buffer(index);
        let fd = self.fd();
        retry_eintr(|| unsafe {
            v4l2::ioctl(fd, vidioc::VIDIOC_QBUF, &mut buf as *mut _ as *mut c_void)
        })
        .map_err(|e| CaptureError::QueueFailed {
            index,
            details: e.to_string(),
        })
    }

    fn set_streaming(&mut self, on: bool) -> Result<(), CaptureError> {
        let mut buf_type = Type::VideoCapture as u32;
        let request = if on {
            vidioc::VIDIOC_STREAMON
        } else {
            vidioc::VIDIOC_STREAMOFF
        };
        let fd = self.fd();
        retry_eintr(|| unsafe { v4l2::ioctl(fd, request, &mut buf_type as *mut _ as *mut c_void) })
            .map_err(|e| CaptureError::StreamToggleFailed {
                enable: on,
                details: e.to_string(),
            })
    }

    fn dequeue_buffer(&mut self, timeout: Duration) -> Result<DequeuedBuffer, CaptureError> {
        self.wait_for_frame(timeout)?;

        let mut buf = capture_buffer(0);
        let fd = self.fd();
        retry_eintr(|| unsafe {
            v4l2::ioctl(fd, vidioc::VIDIOC_DQBUF, &mut buf as *mut _ as *mut c_void)
        })
        .map_err(|e| CaptureError::DequeueFailed {
            details: format!("VIDIOC_DQBUF: {}", e),
        })?;

        Ok(DequeuedBuffer {
            index: buf.index,
            bytes_used: buf.bytesused as usize,
            sequence: buf.sequence,
        })
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        debug!(device = %self.path, "Closing capture device");
    }
}
