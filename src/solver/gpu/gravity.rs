use super::boundary::BoundaryTable;
use super::context::GpuContext;
use super::program::{bind_group, encode_dispatch, Program};
use crate::solver::codegen::slots;

/// Self-gravity support: Jacobi relaxation of the Poisson equation over a
/// ping-pong pair of potential buffers, plus the source-term kernel that
/// folds the converged potential's gradient into the state derivative.
pub struct SelfGravitation {
    relax_iters: usize,
    relax_pipeline: wgpu::ComputePipeline,
    deriv_pipeline: wgpu::ComputePipeline,
    // relax_binds[p] reads potential[p] and writes potential[1 - p]
    relax_binds: [wgpu::BindGroup; 2],
    parity: usize,
    volume: u32,
}

impl SelfGravitation {
    pub fn new(
        ctx: &GpuContext,
        program: &Program,
        state: &wgpu::Buffer,
        potential: &[wgpu::Buffer; 2],
        relax_iters: usize,
        volume: u32,
    ) -> Result<Self, String> {
        let relax_pipeline = program.kernel(ctx, "poisson_relax")?;
        let deriv_pipeline = program.kernel(ctx, "gravity_deriv")?;
        let relax_binds = [
            bind_group(
                &ctx.device,
                &relax_pipeline,
                &[
                    (slots::STATE, state),
                    (slots::POISSON_SRC, &potential[0]),
                    (slots::POISSON_DST, &potential[1]),
                ],
            ),
            bind_group(
                &ctx.device,
                &relax_pipeline,
                &[
                    (slots::STATE, state),
                    (slots::POISSON_SRC, &potential[1]),
                    (slots::POISSON_DST, &potential[0]),
                ],
            ),
        ];
        Ok(Self {
            relax_iters,
            relax_pipeline,
            deriv_pipeline,
            relax_binds,
            parity: 0,
            volume,
        })
    }

    /// Index of the potential buffer currently holding the latest solution.
    pub fn parity(&self) -> usize {
        self.parity
    }

    /// Runs the fixed relaxation schedule, refreshing potential ghost cells
    /// before every sweep.
    pub fn encode_relax(&mut self, encoder: &mut wgpu::CommandEncoder, boundary: &BoundaryTable) {
        for _ in 0..self.relax_iters {
            boundary.encode_potential(encoder, self.parity);
            encode_dispatch(
                encoder,
                &self.relax_pipeline,
                &self.relax_binds[self.parity],
                self.volume,
            );
            self.parity ^= 1;
        }
    }

    /// Adds the gravitational momentum and energy source terms to `deriv`.
    pub fn encode_deriv(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        state: &wgpu::Buffer,
        potential: &[wgpu::Buffer; 2],
        deriv: &wgpu::Buffer,
    ) {
        let bind = bind_group(
            &ctx.device,
            &self.deriv_pipeline,
            &[
                (slots::STATE, state),
                (slots::POTENTIAL, &potential[self.parity]),
                (slots::DERIV, deriv),
            ],
        );
        encode_dispatch(encoder, &self.deriv_pipeline, &bind, self.volume);
    }
}
