use super::buffers::BufferArena;
use super::context::GpuContext;
use super::program::{bind_group, encode_dispatch, Program};
use super::structs::CombineParams;
use crate::solver::codegen::slots;
use crate::solver::config::IntegratorKind;

/// Explicit time integrator. Stage derivative buffers, per-site scale
/// uniforms and bind groups are built once; `encode` only writes the scale
/// values for the current dt and records the dispatches.
pub struct Integrator {
    kind: IntegratorKind,
    combine: wgpu::ComputePipeline,
    accumulate: wgpu::ComputePipeline,
    stages: Vec<wgpu::Buffer>,
    state_old: Option<wgpu::Buffer>,
    scales: Vec<wgpu::Buffer>,
    site_binds: Vec<wgpu::BindGroup>,
    n_elems: u32,
    bytes: u64,
}

impl Integrator {
    pub fn new(
        kind: IntegratorKind,
        ctx: &GpuContext,
        program: &Program,
        arena: &mut BufferArena,
        state: &wgpu::Buffer,
        n_elems: u32,
    ) -> Result<Self, String> {
        let combine = program.kernel(ctx, "combine")?;
        let accumulate = program.kernel(ctx, "accumulate")?;
        let bytes = n_elems as u64 * 4;

        let num_stages = match kind {
            IntegratorKind::ForwardEuler => 1,
            IntegratorKind::RungeKutta4 => 4,
        };
        let stages: Vec<wgpu::Buffer> = (0..num_stages)
            .map(|i| arena.alloc(&ctx.device, bytes, &format!("derivBuffer{i}")))
            .collect();
        let state_old = match kind {
            IntegratorKind::ForwardEuler => None,
            IntegratorKind::RungeKutta4 => Some(arena.alloc(&ctx.device, bytes, "stateOldBuffer")),
        };

        let num_sites = match kind {
            IntegratorKind::ForwardEuler => 1,
            IntegratorKind::RungeKutta4 => 7,
        };
        let scales: Vec<wgpu::Buffer> = (0..num_sites)
            .map(|_| {
                arena.alloc_uniform(
                    &ctx.device,
                    std::mem::size_of::<CombineParams>() as u64,
                    "combineParams",
                )
            })
            .collect();

        let acc_bind = |stage: &wgpu::Buffer, scale: &wgpu::Buffer| {
            bind_group(
                &ctx.device,
                &accumulate,
                &[
                    (slots::COMBINE_DST, state),
                    (slots::COMBINE_B, stage),
                    (slots::COMBINE_PARAMS, scale),
                ],
            )
        };
        let site_binds = match kind {
            IntegratorKind::ForwardEuler => vec![acc_bind(&stages[0], &scales[0])],
            IntegratorKind::RungeKutta4 => {
                let old = state_old.as_ref().ok_or("missing rk4 state buffer")?;
                let comb_bind = |stage: &wgpu::Buffer, scale: &wgpu::Buffer| {
                    bind_group(
                        &ctx.device,
                        &combine,
                        &[
                            (slots::COMBINE_DST, state),
                            (slots::COMBINE_A, old),
                            (slots::COMBINE_B, stage),
                            (slots::COMBINE_PARAMS, scale),
                        ],
                    )
                };
                vec![
                    comb_bind(&stages[0], &scales[0]),
                    comb_bind(&stages[1], &scales[1]),
                    comb_bind(&stages[2], &scales[2]),
                    comb_bind(&stages[0], &scales[3]),
                    acc_bind(&stages[1], &scales[4]),
                    acc_bind(&stages[2], &scales[5]),
                    acc_bind(&stages[3], &scales[6]),
                ]
            }
        };

        Ok(Self {
            kind,
            combine,
            accumulate,
            stages,
            state_old,
            scales,
            site_binds,
            n_elems,
            bytes,
        })
    }

    /// Advances the state in place by dt. `deriv_fn` must record whatever
    /// is needed (boundary refresh included) to evaluate the derivative of
    /// the current state contents into the given stage buffer.
    pub fn encode(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        state: &wgpu::Buffer,
        dt: f32,
        deriv_fn: &mut dyn FnMut(&mut wgpu::CommandEncoder, &wgpu::Buffer),
    ) {
        let write_scale = |i: usize, scale: f32| {
            ctx.queue.write_buffer(
                &self.scales[i],
                0,
                bytemuck::bytes_of(&CombineParams {
                    scale,
                    pad: [0.0; 3],
                }),
            );
        };
        match self.kind {
            IntegratorKind::ForwardEuler => {
                write_scale(0, dt);
                deriv_fn(encoder, &self.stages[0]);
                encode_dispatch(encoder, &self.accumulate, &self.site_binds[0], self.n_elems);
            }
            IntegratorKind::RungeKutta4 => {
                write_scale(0, dt * 0.5);
                write_scale(1, dt * 0.5);
                write_scale(2, dt);
                write_scale(3, dt / 6.0);
                write_scale(4, dt / 3.0);
                write_scale(5, dt / 3.0);
                write_scale(6, dt / 6.0);
                if let Some(old) = &self.state_old {
                    encoder.copy_buffer_to_buffer(state, 0, old, 0, self.bytes);
                }
                deriv_fn(encoder, &self.stages[0]);
                encode_dispatch(encoder, &self.combine, &self.site_binds[0], self.n_elems);
                deriv_fn(encoder, &self.stages[1]);
                encode_dispatch(encoder, &self.combine, &self.site_binds[1], self.n_elems);
                deriv_fn(encoder, &self.stages[2]);
                encode_dispatch(encoder, &self.combine, &self.site_binds[2], self.n_elems);
                deriv_fn(encoder, &self.stages[3]);
                encode_dispatch(encoder, &self.combine, &self.site_binds[3], self.n_elems);
                encode_dispatch(encoder, &self.accumulate, &self.site_binds[4], self.n_elems);
                encode_dispatch(encoder, &self.accumulate, &self.site_binds[5], self.n_elems);
                encode_dispatch(encoder, &self.accumulate, &self.site_binds[6], self.n_elems);
            }
        }
    }
}
