use super::{FluxScheme, SchemeKind, SchemeResources};
use crate::solver::codegen::slots;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::program::{bind_group, encode_dispatch};

pub(super) fn sources() -> Vec<String> {
    vec![HLL_WGSL.to_string()]
}

// Two-wave HLL approximate Riemann solver with Davis wave speed bounds.
const HLL_WGSL: &str = r#"
@compute @workgroup_size(64)
fn calc_flux(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let t = global_index(gid, nwg);
    if (t >= VOLUME * DIM) {
        return;
    }
    let i = t / DIM;
    let d = t % DIM;
    if (!is_flux_face(cell_coord(i), d)) {
        return;
    }
    let l = i - axis_step(d);
    let vnl = vcomp(eq_velocity(l), d);
    let vnr = vcomp(eq_velocity(i), d);
    let al = eq_sound_speed(l);
    let ar = eq_sound_speed(i);
    let sl = min(vnl - al, vnr - ar);
    let sr = max(vnl + al, vnr + ar);
    for (var s = 0u; s < NUM_STATES; s = s + 1u) {
        let fl = eq_flux_comp(l, d, s);
        let fr = eq_flux_comp(i, d, s);
        var f = fr;
        if (sl >= 0.0) {
            f = fl;
        } else if (sr > 0.0) {
            let ql = state[l * NUM_STATES + s];
            let qr = state[i * NUM_STATES + s];
            f = (sr * fl - sl * fr + sl * sr * (qr - ql)) / (sr - sl);
        }
        flux[t * NUM_STATES + s] = f;
    }
}
"#;

pub struct EulerHll {
    flux_pipeline: wgpu::ComputePipeline,
    flux_deriv_pipeline: wgpu::ComputePipeline,
    timestep_pipeline: wgpu::ComputePipeline,
    flux_bind: wgpu::BindGroup,
    timestep_bind: wgpu::BindGroup,
    volume: u32,
    dim: u32,
}

impl EulerHll {
    pub fn new(res: &SchemeResources) -> Result<Self, String> {
        let device = &res.ctx.device;
        let flux_pipeline = res.program.kernel(res.ctx, "calc_flux")?;
        let flux_deriv_pipeline = res.program.kernel(res.ctx, "calc_flux_deriv")?;
        let timestep_pipeline = res.program.kernel(res.ctx, "calc_cell_timestep")?;

        let flux_bind = bind_group(
            device,
            &flux_pipeline,
            &[(slots::STATE, res.state), (slots::FLUX, res.flux)],
        );
        let timestep_bind = bind_group(
            device,
            &timestep_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::STEP_PARAMS, res.step_params),
                (slots::CFL_METRIC, res.cfl_metric),
            ],
        );

        Ok(Self {
            flux_pipeline,
            flux_deriv_pipeline,
            timestep_pipeline,
            flux_bind,
            timestep_bind,
            volume: res.volume,
            dim: res.dim,
        })
    }
}

impl FluxScheme for EulerHll {
    fn kind(&self) -> SchemeKind {
        SchemeKind::EulerHll
    }

    fn encode_timestep_metric(&self, encoder: &mut wgpu::CommandEncoder) {
        encode_dispatch(encoder, &self.timestep_pipeline, &self.timestep_bind, self.volume);
    }

    fn encode_derivative(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        _state: &wgpu::Buffer,
        flux: &wgpu::Buffer,
        deriv: &wgpu::Buffer,
    ) {
        encode_dispatch(encoder, &self.flux_pipeline, &self.flux_bind, self.volume * self.dim);
        let flux_deriv_bind = bind_group(
            &ctx.device,
            &self.flux_deriv_pipeline,
            &[(slots::FLUX, flux), (slots::DERIV, deriv)],
        );
        encode_dispatch(encoder, &self.flux_deriv_pipeline, &flux_deriv_bind, self.volume);
    }
}
