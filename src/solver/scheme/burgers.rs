use super::{FluxScheme, SchemeKind, SchemeResources};
use crate::solver::codegen::slots;
use crate::solver::gpu::buffers::BufferArena;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::program::{bind_group, encode_dispatch};

pub(super) fn sources() -> Vec<String> {
    vec![BURGERS_WGSL.to_string()]
}

// Operator-split scheme: limited upwind advection along cell-averaged
// interface velocities, with the pressure gradient and pressure work
// applied as a separate central-difference pass.
const BURGERS_WGSL: &str = r#"
@compute @workgroup_size(64)
fn calc_interface_velocity(
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
    interface_velocity[t] = 0.5 * (vcomp(eq_velocity(l), d) + vcomp(eq_velocity(i), d));
}

@compute @workgroup_size(64)
fn compute_pressure(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= VOLUME) {
        return;
    }
    pressure[i] = eq_pressure(i);
}

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
    let iv = interface_velocity[t];
    let nu = abs(iv) * step_params.dt / axis_dx(d);
    for (var s = 0u; s < NUM_STATES; s = s + 1u) {
        let ql = state[l * NUM_STATES + s];
        let qr = state[i * NUM_STATES + s];
        let dq = qr - ql;
        var donor = qr;
        var qup = state[(i + axis_step(d)) * NUM_STATES + s] - qr;
        if (iv >= 0.0) {
            donor = ql;
            qup = ql - state[(l - axis_step(d)) * NUM_STATES + s];
        }
        var r = 0.0;
        if (abs(dq) > 1e-20) {
            r = qup / dq;
        }
        let phi = slope_limiter(r);
        flux[t * NUM_STATES + s] = iv * donor + 0.5 * abs(iv) * (1.0 - nu) * phi * dq;
    }
}

@compute @workgroup_size(64)
fn add_pressure_deriv(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= VOLUME) {
        return;
    }
    if (!is_interior(cell_coord(i))) {
        return;
    }
    for (var d = 0u; d < DIM; d = d + 1u) {
        let s = axis_step(d);
        let inv2h = 0.5 / axis_dx(d);
        let dp = (pressure[i + s] - pressure[i - s]) * inv2h;
        deriv[i * NUM_STATES + 1u + d] = deriv[i * NUM_STATES + 1u + d] - dp;
        let work = (pressure[i + s] * vcomp(eq_velocity(i + s), d)
            - pressure[i - s] * vcomp(eq_velocity(i - s), d)) * inv2h;
        deriv[i * NUM_STATES + NUM_STATES - 1u] = deriv[i * NUM_STATES + NUM_STATES - 1u] - work;
    }
}
"#;

pub struct Burgers {
    iv_pipeline: wgpu::ComputePipeline,
    pressure_pipeline: wgpu::ComputePipeline,
    flux_pipeline: wgpu::ComputePipeline,
    flux_deriv_pipeline: wgpu::ComputePipeline,
    pressure_deriv_pipeline: wgpu::ComputePipeline,
    timestep_pipeline: wgpu::ComputePipeline,
    pressure: wgpu::Buffer,
    iv_bind: wgpu::BindGroup,
    pressure_bind: wgpu::BindGroup,
    flux_bind: wgpu::BindGroup,
    timestep_bind: wgpu::BindGroup,
    volume: u32,
    dim: u32,
}

impl Burgers {
    pub fn new(res: &SchemeResources, arena: &mut BufferArena) -> Result<Self, String> {
        let device = &res.ctx.device;
        let iv_pipeline = res.program.kernel(res.ctx, "calc_interface_velocity")?;
        let pressure_pipeline = res.program.kernel(res.ctx, "compute_pressure")?;
        let flux_pipeline = res.program.kernel(res.ctx, "calc_flux")?;
        let flux_deriv_pipeline = res.program.kernel(res.ctx, "calc_flux_deriv")?;
        let pressure_deriv_pipeline = res.program.kernel(res.ctx, "add_pressure_deriv")?;
        let timestep_pipeline = res.program.kernel(res.ctx, "calc_cell_timestep")?;

        let faces = res.volume as u64 * res.dim as u64;
        let interface_velocity = arena.alloc(device, faces * 4, "interfaceVelocityBuffer");
        let pressure = arena.alloc(device, res.volume as u64 * 4, "pressureBuffer");

        let iv_bind = bind_group(
            device,
            &iv_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::INTERFACE_VELOCITY, &interface_velocity),
            ],
        );
        let pressure_bind = bind_group(
            device,
            &pressure_pipeline,
            &[(slots::STATE, res.state), (slots::PRESSURE, &pressure)],
        );
        let flux_bind = bind_group(
            device,
            &flux_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::STEP_PARAMS, res.step_params),
                (slots::FLUX, res.flux),
                (slots::INTERFACE_VELOCITY, &interface_velocity),
            ],
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
            iv_pipeline,
            pressure_pipeline,
            flux_pipeline,
            flux_deriv_pipeline,
            pressure_deriv_pipeline,
            timestep_pipeline,
            pressure,
            iv_bind,
            pressure_bind,
            flux_bind,
            timestep_bind,
            volume: res.volume,
            dim: res.dim,
        })
    }
}

impl FluxScheme for Burgers {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Burgers
    }

    fn encode_timestep_metric(&self, encoder: &mut wgpu::CommandEncoder) {
        encode_dispatch(encoder, &self.timestep_pipeline, &self.timestep_bind, self.volume);
    }

    fn encode_derivative(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        state: &wgpu::Buffer,
        flux: &wgpu::Buffer,
        deriv: &wgpu::Buffer,
    ) {
        let faces = self.volume * self.dim;
        encode_dispatch(encoder, &self.iv_pipeline, &self.iv_bind, faces);
        encode_dispatch(encoder, &self.pressure_pipeline, &self.pressure_bind, self.volume);
        encode_dispatch(encoder, &self.flux_pipeline, &self.flux_bind, faces);
        let flux_deriv_bind = bind_group(
            &ctx.device,
            &self.flux_deriv_pipeline,
            &[(slots::FLUX, flux), (slots::DERIV, deriv)],
        );
        encode_dispatch(encoder, &self.flux_deriv_pipeline, &flux_deriv_bind, self.volume);
        let pressure_deriv_bind = bind_group(
            &ctx.device,
            &self.pressure_deriv_pipeline,
            &[
                (slots::STATE, state),
                (slots::DERIV, deriv),
                (slots::PRESSURE, &self.pressure),
            ],
        );
        encode_dispatch(
            encoder,
            &self.pressure_deriv_pipeline,
            &pressure_deriv_bind,
            self.volume,
        );
    }
}
