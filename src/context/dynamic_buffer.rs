//! Dynamic uniform buffer for per-draw uniform snapshots.
//!
//! Each draw pushes the current uniform block of its program. The blocks are
//! accumulated in CPU memory and written to the GPU in a single `write_buffer` call
//! before the frame's render passes are encoded; every draw then selects its block
//! with a dynamic offset.

/// A growable uniform buffer addressed by dynamic offsets.
pub struct DynamicUniformBuffer {
    /// CPU-side data accumulator
    data: Vec<u8>,
    buffer: wgpu::Buffer,
    /// Current capacity in bytes
    capacity: u64,
    /// Alignment of each entry (from device limits)
    alignment: u64,
    label: &'static str,
}

impl DynamicUniformBuffer {
    /// Creates a buffer with room for `initial_capacity` bytes.
    pub fn with_capacity(device: &wgpu::Device, label: &'static str, initial_capacity: u64) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let capacity = initial_capacity.max(alignment);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            data: Vec::with_capacity(capacity as usize),
            buffer,
            capacity,
            alignment,
            label,
        }
    }

    /// Clears the buffer for the next frame.
    ///
    /// This resets the CPU-side data but doesn't deallocate memory.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns true if nothing was pushed since the last clear.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pushes a uniform block and returns its byte offset in the buffer.
    ///
    /// `flush()` must be called after all pushes and before rendering.
    pub fn push(&mut self, bytes: &[u8]) -> u32 {
        let offset = self.data.len() as u64;
        debug_assert_eq!(offset % self.alignment, 0);

        self.data.extend_from_slice(bytes);

        // Pad to alignment
        let aligned = (bytes.len() as u64).div_ceil(self.alignment) * self.alignment;
        let padding = (aligned - bytes.len() as u64) as usize;
        self.data.extend(std::iter::repeat_n(0u8, padding));

        offset as u32
    }

    /// Writes the accumulated data to the GPU buffer, growing it if necessary.
    ///
    /// Returns true if the buffer was reallocated (requiring bind group recreation).
    pub fn flush(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        if self.data.is_empty() {
            return false;
        }

        let required_size = self.data.len() as u64;

        let reallocated = if required_size > self.capacity {
            self.grow(device, required_size);
            true
        } else {
            false
        };

        queue.write_buffer(&self.buffer, 0, &self.data);
        reallocated
    }

    fn grow(&mut self, device: &wgpu::Device, required_size: u64) {
        // Double capacity until it's enough
        let mut new_capacity = self.capacity;
        while new_capacity < required_size {
            new_capacity *= 2;
        }

        self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(self.label),
            size: new_capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.capacity = new_capacity;
    }

    #[inline]
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}
