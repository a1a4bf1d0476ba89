//! Per-processor pool of the four role-tagged frame buffers

use crate::error::{PipelineError, Result};
use crate::types::{BufferRole, FrameSize};
use image::{GrayImage, ImageBuffer, RgbImage};

/// The four working buffers of one processor. All four always share the
/// same width and height.
#[derive(Debug)]
pub struct FrameBuffers {
    pub input: RgbImage,
    pub grayscale: GrayImage,
    pub edges: GrayImage,
    pub output: RgbImage,
}

impl FrameBuffers {
    fn allocate(size: FrameSize) -> Result<Self> {
        let FrameSize { width, height } = size;
        let input = ImageBuffer::from_raw(width, height, allocate_plane(BufferRole::Input, size)?);
        let grayscale =
            ImageBuffer::from_raw(width, height, allocate_plane(BufferRole::Grayscale, size)?);
        let edges =
            ImageBuffer::from_raw(width, height, allocate_plane(BufferRole::EdgeMap, size)?);
        let output =
            ImageBuffer::from_raw(width, height, allocate_plane(BufferRole::Output, size)?);

        match (input, grayscale, edges, output) {
            (Some(input), Some(grayscale), Some(edges), Some(output)) => Ok(Self {
                input,
                grayscale,
                edges,
                output,
            }),
            _ => Err(PipelineError::Processing(format!(
                "buffer planes do not match {size}"
            ))),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.input.width(), self.input.height())
    }

    /// Total bytes held by the four buffers
    pub fn byte_size(&self) -> usize {
        self.input.len() + self.grayscale.len() + self.edges.len() + self.output.len()
    }
}

/// Allocate one zeroed plane, reporting allocation failure instead of aborting
fn allocate_plane(role: BufferRole, size: FrameSize) -> Result<Vec<u8>> {
    let bytes = role
        .format()
        .calculate_size(size.width, size.height)
        .ok_or_else(|| {
            PipelineError::invalid_frame(size.width, size.height, "buffer size overflows usize")
        })?;

    let mut data = Vec::new();
    data.try_reserve_exact(bytes)
        .map_err(|source| PipelineError::BufferAllocation {
            buffer: role.name(),
            bytes,
            source,
        })?;
    data.resize(bytes, 0);
    Ok(data)
}

/// Lazily allocated buffer set, reused across frames of the same size
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Option<FrameBuffers>,
    allocations: u64,
}

impl BufferPool {
    /// Create an empty pool. Nothing is allocated until the first `ensure`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure all four buffers exist with the given dimensions.
    ///
    /// Buffers of matching size are returned as-is. A size change drops
    /// the old set and allocates a new one. On allocation failure the pool
    /// is left empty, so a later call can retry.
    pub fn ensure(&mut self, size: FrameSize) -> Result<&mut FrameBuffers> {
        let current = self.buffers.as_ref().map(FrameBuffers::size);

        if current != Some(size) {
            if let Some(old) = current {
                log::debug!("Frame size changed {} -> {}, reallocating buffers", old, size);
            }
            self.buffers = None;

            let buffers = FrameBuffers::allocate(size)?;
            log::debug!(
                "Allocated {} buffer bytes for {} frames",
                buffers.byte_size(),
                size
            );
            self.allocations += 1;
            self.buffers = Some(buffers);
        }

        self.buffers
            .as_mut()
            .ok_or_else(|| PipelineError::Processing("buffer pool is empty".into()))
    }

    pub fn buffers(&self) -> Option<&FrameBuffers> {
        self.buffers.as_ref()
    }

    /// Current buffer dimensions, `None` while unallocated
    pub fn size(&self) -> Option<FrameSize> {
        self.buffers.as_ref().map(FrameBuffers::size)
    }

    pub fn is_allocated(&self) -> bool {
        self.buffers.is_some()
    }

    /// Drop all four buffers at once
    pub fn release(&mut self) {
        if self.buffers.take().is_some() {
            log::debug!("Buffer pool released");
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let size = self.size().unwrap_or_default();
        PoolStats {
            width: size.width,
            height: size.height,
            allocations: self.allocations,
            bytes: self.buffers.as_ref().map_or(0, FrameBuffers::byte_size),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub width: u32,
    pub height: u32,
    /// Number of times the buffer set has been (re)allocated
    pub allocations: u64,
    pub bytes: usize,
}
