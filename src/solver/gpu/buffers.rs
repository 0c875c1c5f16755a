/// Tracks every device allocation the solver makes so the running total can
/// be logged alongside each request.
pub struct BufferArena {
    total: u64,
}

impl BufferArena {
    pub fn new() -> Self {
        Self { total: 0 }
    }

    pub fn alloc(&mut self, device: &wgpu::Device, size: u64, tag: &str) -> wgpu::Buffer {
        self.total += size;
        log::info!(
            "allocating gpu mem size {} for {} running total {}",
            size,
            tag,
            self.total
        );
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(tag),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    pub fn alloc_uniform(&mut self, device: &wgpu::Device, size: u64, tag: &str) -> wgpu::Buffer {
        self.total += size;
        log::info!(
            "allocating gpu mem size {} for {} running total {}",
            size,
            tag,
            self.total
        );
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(tag),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn total_allocated(&self) -> u64 {
        self.total
    }
}

impl Default for BufferArena {
    fn default() -> Self {
        Self::new()
    }
}
