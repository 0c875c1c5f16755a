use super::context::GpuContext;

/// Copies `count` u32 values from a storage buffer back to the host.
pub fn read_buffer_u32(
    ctx: &GpuContext,
    buffer: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<u32>, String> {
    let raw = read_buffer_f32(ctx, buffer, count)?;
    Ok(bytemuck::cast_slice::<f32, u32>(&raw).to_vec())
}

/// Copies `count` f32 values from a storage buffer back to the host.
/// Blocks until the copy has completed.
pub fn read_buffer_f32(
    ctx: &GpuContext,
    buffer: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<f32>, String> {
    let size = (count * std::mem::size_of::<f32>()) as u64;
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    ctx.queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|e| format!("readback channel closed: {e}"))?
        .map_err(|e| format!("failed to map staging buffer: {e}"))?;

    let data = slice.get_mapped_range();
    let out = bytemuck::cast_slice::<u8, f32>(&data).to_vec();
    drop(data);
    staging.unmap();
    Ok(out)
}
