use super::device::{BufferDescriptor, VideoDevice};
use crate::error::CaptureError;
use tracing::{debug, warn};

/// One memory-mapped capture buffer. Unmapped when dropped.
pub struct MappedBuffer<M> {
    index: u32,
    length: usize,
    mapping: M,
}

impl<M: AsRef<[u8]>> MappedBuffer<M> {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        self.mapping.as_ref()
    }
}

/// Index-addressed set of mapped buffers for one capture session
pub struct BufferPool<M> {
    buffers: Vec<MappedBuffer<M>>,
}

impl<M: AsRef<[u8]>> BufferPool<M> {
    pub fn empty() -> Self {
        Self {
            buffers: Vec::new(),
        }
    }

    /// Map every descriptor in order.
    ///
    /// If mapping buffer `i` fails, buffers `0..i` are unmapped before the
    /// error is returned.
    pub fn map<D>(device: &mut D, descriptors: &[BufferDescriptor]) -> Result<Self, CaptureError>
    where
        D: VideoDevice<Mapping = M>,
    {
        let mut pool = Self {
            buffers: Vec::with_capacity(descriptors.len()),
        };

        for descriptor in descriptors {
            match device.map_buffer(descriptor) {
                Ok(mapping) => pool.buffers.push(MappedBuffer {
                    index: descriptor.index,
                    length: descriptor.length,
                    mapping,
                }),
                Err(e) => {
                    if !pool.is_empty() {
                        warn!(
                            "Mapping buffer {} failed, unmapping {} already mapped",
                            descriptor.index,
                            pool.len()
                        );
                    }
                    pool.release();
                    return Err(e);
                }
            }
        }

        debug!("Mapped {} capture buffer(s)", pool.len());
        Ok(pool)
    }

    pub fn get(&self, index: u32) -> Option<&MappedBuffer<M>> {
        self.buffers.iter().find(|buffer| buffer.index == index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedBuffer<M>> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Unmap every buffer. Safe on an empty or already released pool.
    pub fn release(&mut self) {
        let count = self.buffers.len();
        self.buffers.clear();
        if count > 0 {
            debug!("Unmapped {} capture buffer(s)", count);
        }
    }
}
