use super::context::GpuContext;
use super::program::{bind_group, encode_dispatch, Program};
use super::readback::read_buffer_f32;
use super::structs::ReduceParams;
use crate::solver::codegen::slots;

pub const REDUCE_GROUP_WIDTH: u32 = 64;

/// Multi-pass parallel minimum over the per-cell CFL metric. Each pass
/// folds groups of 64 values into one partial minimum; the scratch pair is
/// ping-ponged so the metric buffer itself is never overwritten.
pub struct MinReduce {
    pipeline: wgpu::ComputePipeline,
    params: wgpu::Buffer,
}

impl MinReduce {
    pub fn new(ctx: &GpuContext, program: &Program) -> Result<Self, String> {
        let pipeline = program.kernel(ctx, "reduce_min")?;
        let params = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reduce params"),
            size: std::mem::size_of::<ReduceParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(Self { pipeline, params })
    }

    /// Reduces `count` values from `metric` down to a scalar, leaves that
    /// scalar in `dst` (a one-element buffer), and returns it.
    pub fn run(
        &self,
        ctx: &GpuContext,
        metric: &wgpu::Buffer,
        scratch: &[wgpu::Buffer; 2],
        dst: &wgpu::Buffer,
        count: u32,
    ) -> Result<f32, String> {
        let mut n = count;
        let mut src = metric;
        let mut parity = 0;
        while n > 1 {
            let groups = n.div_ceil(REDUCE_GROUP_WIDTH);
            let target = if groups == 1 { dst } else { &scratch[parity] };
            ctx.queue.write_buffer(
                &self.params,
                0,
                bytemuck::bytes_of(&ReduceParams {
                    n,
                    pad: [0; 3],
                }),
            );
            let bind = bind_group(
                &ctx.device,
                &self.pipeline,
                &[
                    (slots::REDUCE_SRC, src),
                    (slots::REDUCE_DST, target),
                    (slots::REDUCE_PARAMS, &self.params),
                ],
            );
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            encode_dispatch(&mut encoder, &self.pipeline, &bind, n);
            ctx.queue.submit(Some(encoder.finish()));
            ctx.device.poll(wgpu::Maintain::Wait);
            src = &scratch[parity];
            parity ^= 1;
            n = groups;
        }
        if count == 1 {
            let mut encoder = ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            encoder.copy_buffer_to_buffer(metric, 0, dst, 0, 4);
            ctx.queue.submit(Some(encoder.finish()));
        }
        let out = read_buffer_f32(ctx, dst, 1)?;
        Ok(out[0])
    }
}
