use super::{FluxScheme, SchemeKind, SchemeResources};
use crate::solver::codegen::slots;
use crate::solver::config::SolverConfig;
use crate::solver::gpu::buffers::BufferArena;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::program::{bind_group, encode_dispatch};

pub(super) fn sources(config: &SolverConfig) -> Vec<String> {
    let esd = config.grid.dim() as u32 + 2;
    vec![
        roe_core_fragment(esd),
        EULER_ROE_WGSL.to_string(),
    ]
}

/// Characteristic-space flux machinery shared by the Roe-family schemes.
/// The including fragment must define `char_state_channel`, mapping an
/// eigen-space index to a state channel for a given face axis, and an
/// eigenbasis kernel filling `eigenvalues` (ascending) and `eigenvectors`
/// (forward matrix then inverse, row-major, per face).
pub(super) fn roe_core_fragment(esd: u32) -> String {
    format!(
        "const EIGEN_SPACE_DIM: u32 = {esd}u;\n\
         const EIGEN_TRANSFORM_SIZE: u32 = {size}u;\n{core}",
        esd = esd,
        size = 2 * esd * esd,
        core = ROE_CORE_WGSL,
    )
}

const ROE_CORE_WGSL: &str = r#"
// Faces carrying characteristic data: one face wider along the flux axis
// than the flux range, since the limiter reads the upwind neighbor's
// jumps. Both adjacent cells exist for every such face.
fn is_char_face(c: vec3<u32>, d: u32) -> bool {
    var ok = true;
    for (var e = 0u; e < DIM; e = e + 1u) {
        let ce = ucomp(c, e);
        let n = axis_size(e);
        if (e == d) {
            ok = ok && ce >= 1u;
        } else {
            ok = ok && ce >= 2u && ce + 2u < n;
        }
    }
    return ok;
}

// Characteristic jumps across each face: alpha = L (q_R - q_L).
@compute @workgroup_size(64)
fn calc_delta_qtilde(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let t = global_index(gid, nwg);
    if (t >= VOLUME * DIM) {
        return;
    }
    let i = t / DIM;
    let d = t % DIM;
    if (!is_char_face(cell_coord(i), d)) {
        return;
    }
    let l = i - axis_step(d);
    let lbase = t * EIGEN_TRANSFORM_SIZE + EIGEN_SPACE_DIM * EIGEN_SPACE_DIM;
    for (var k = 0u; k < EIGEN_SPACE_DIM; k = k + 1u) {
        var sum = 0.0;
        for (var m = 0u; m < EIGEN_SPACE_DIM; m = m + 1u) {
            let ch = char_state_channel(m, d);
            let dq = state[i * NUM_STATES + ch] - state[l * NUM_STATES + ch];
            sum = sum + eigenvectors[lbase + k * EIGEN_SPACE_DIM + m] * dq;
        }
        delta_qtilde[t * EIGEN_SPACE_DIM + k] = sum;
    }
}

// Central flux plus the limited characteristic correction for one face.
fn roe_flux_at(t: u32) {
    let i = t / DIM;
    let d = t % DIM;
    let l = i - axis_step(d);
    let ebase = t * EIGEN_SPACE_DIM;
    let rbase = t * EIGEN_TRANSFORM_SIZE;
    let nu0 = step_params.dt / axis_dx(d);

    var char_flux: array<f32, EIGEN_SPACE_DIM>;
    for (var k = 0u; k < EIGEN_SPACE_DIM; k = k + 1u) {
        let lam = eigenvalues[ebase + k];
        let alpha = delta_qtilde[t * EIGEN_SPACE_DIM + k];
        var up = (i + axis_step(d)) * DIM + d;
        if (lam >= 0.0) {
            up = l * DIM + d;
        }
        var r = 0.0;
        if (abs(alpha) > 1e-20) {
            r = delta_qtilde[up * EIGEN_SPACE_DIM + k] / alpha;
        }
        let phi = slope_limiter(r);
        let absl = abs(lam);
        char_flux[k] = -0.5 * absl * alpha * (1.0 - phi * (1.0 - absl * nu0));
    }

    for (var s = 0u; s < NUM_STATES; s = s + 1u) {
        flux[t * NUM_STATES + s] = 0.5 * (eq_flux_comp(l, d, s) + eq_flux_comp(i, d, s));
    }
    for (var k = 0u; k < EIGEN_SPACE_DIM; k = k + 1u) {
        for (var m = 0u; m < EIGEN_SPACE_DIM; m = m + 1u) {
            let ch = char_state_channel(m, d);
            flux[t * NUM_STATES + ch] = flux[t * NUM_STATES + ch]
                + eigenvectors[rbase + m * EIGEN_SPACE_DIM + k] * char_flux[k];
        }
    }
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
    if (!is_flux_face(cell_coord(t / DIM), t % DIM)) {
        return;
    }
    roe_flux_at(t);
}

// Per-cell CFL metric from the extremal eigenvalues of the surrounding
// faces. Eigenvalues are sorted, so only the first and last matter.
@compute @workgroup_size(64)
fn calc_cell_timestep_eig(
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
    var m = F32_MAX;
    for (var d = 0u; d < DIM; d = d + 1u) {
        let fl = (i * DIM + d) * EIGEN_SPACE_DIM;
        let fr = ((i + axis_step(d)) * DIM + d) * EIGEN_SPACE_DIM;
        let smax = max(
            max(abs(eigenvalues[fl]), abs(eigenvalues[fl + EIGEN_SPACE_DIM - 1u])),
            max(abs(eigenvalues[fr]), abs(eigenvalues[fr + EIGEN_SPACE_DIM - 1u])),
        );
        if (smax > 0.0) {
            m = min(m, axis_dx(d) / smax);
        }
    }
    cfl_metric[i] = m * step_params.cfl;
}
"#;

// Roe-averaged eigensystem of the Euler equations. Wave order is
// ascending: acoustic-, entropy, shear (one per transverse axis),
// acoustic+.
const EULER_ROE_WGSL: &str = r#"
fn char_state_channel(k: u32, d: u32) -> u32 {
    return k;
}

@compute @workgroup_size(64)
fn calc_eigen_basis(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let t = global_index(gid, nwg);
    if (t >= VOLUME * DIM) {
        return;
    }
    let i = t / DIM;
    let d = t % DIM;
    if (!is_char_face(cell_coord(i), d)) {
        return;
    }
    let l = i - axis_step(d);

    let rho_l = eq_density(l);
    let rho_r = eq_density(i);
    let wl = sqrt(rho_l);
    let wr = sqrt(rho_r);
    let inv = 1.0 / (wl + wr);
    let v = (eq_velocity(l) * wl + eq_velocity(i) * wr) * inv;
    let hl = (eq_energy(l) + eq_pressure(l)) / rho_l;
    let hr = (eq_energy(i) + eq_pressure(i)) / rho_r;
    let h = (hl * wl + hr * wr) * inv;
    let vsq = dot(v, v);
    let a2 = max((GAMMA - 1.0) * (h - 0.5 * vsq), 1e-20);
    let a = sqrt(a2);
    let vn = vcomp(v, d);

    let n = EIGEN_SPACE_DIM;
    let last = n - 1u;
    let ebase = t * n;
    eigenvalues[ebase] = vn - a;
    for (var k = 1u; k < last; k = k + 1u) {
        eigenvalues[ebase + k] = vn;
    }
    eigenvalues[ebase + last] = vn + a;

    let rbase = t * EIGEN_TRANSFORM_SIZE;
    let lbase = rbase + n * n;
    for (var q = 0u; q < n * n; q = q + 1u) {
        eigenvectors[rbase + q] = 0.0;
        eigenvectors[lbase + q] = 0.0;
    }

    let b1 = (GAMMA - 1.0) / a2;
    let b2 = 0.5 * b1 * vsq;

    // acoustic columns 0 and last
    eigenvectors[rbase] = 1.0;
    eigenvectors[rbase + last] = 1.0;
    eigenvectors[rbase + last * n] = h - a * vn;
    eigenvectors[rbase + last * n + last] = h + a * vn;
    // entropy column 1
    eigenvectors[rbase + 1u] = 1.0;
    eigenvectors[rbase + last * n + 1u] = 0.5 * vsq;
    for (var e = 0u; e < DIM; e = e + 1u) {
        var nd = 0.0;
        if (e == d) {
            nd = 1.0;
        }
        let ve = vcomp(v, e);
        eigenvectors[rbase + (1u + e) * n] = ve - a * nd;
        eigenvectors[rbase + (1u + e) * n + last] = ve + a * nd;
        eigenvectors[rbase + (1u + e) * n + 1u] = ve;
    }
    // shear columns 2 .. last-1, one per transverse axis
    var col = 2u;
    for (var e = 0u; e < DIM; e = e + 1u) {
        if (e == d) {
            continue;
        }
        eigenvectors[rbase + (1u + e) * n + col] = 1.0;
        eigenvectors[rbase + last * n + col] = vcomp(v, e);
        col = col + 1u;
    }

    // inverse rows
    eigenvectors[lbase] = 0.5 * (b2 + vn / a);
    eigenvectors[lbase + last] = 0.5 * b1;
    eigenvectors[lbase + n] = 1.0 - b2;
    eigenvectors[lbase + n + last] = -b1;
    eigenvectors[lbase + last * n] = 0.5 * (b2 - vn / a);
    eigenvectors[lbase + last * n + last] = 0.5 * b1;
    for (var e = 0u; e < DIM; e = e + 1u) {
        var nd = 0.0;
        if (e == d) {
            nd = 1.0;
        }
        let ve = vcomp(v, e);
        eigenvectors[lbase + 1u + e] = -0.5 * (b1 * ve + nd / a);
        eigenvectors[lbase + n + 1u + e] = b1 * ve;
        eigenvectors[lbase + last * n + 1u + e] = -0.5 * (b1 * ve - nd / a);
    }
    var row = 2u;
    for (var e = 0u; e < DIM; e = e + 1u) {
        if (e == d) {
            continue;
        }
        eigenvectors[lbase + row * n] = -vcomp(v, e);
        eigenvectors[lbase + row * n + 1u + e] = 1.0;
        row = row + 1u;
    }
}
"#;

pub struct EulerRoe {
    eigen_pipeline: wgpu::ComputePipeline,
    dq_pipeline: wgpu::ComputePipeline,
    flux_pipeline: wgpu::ComputePipeline,
    flux_deriv_pipeline: wgpu::ComputePipeline,
    timestep_pipeline: wgpu::ComputePipeline,
    eigen_bind: wgpu::BindGroup,
    dq_bind: wgpu::BindGroup,
    flux_bind: wgpu::BindGroup,
    timestep_bind: wgpu::BindGroup,
    volume: u32,
    dim: u32,
}

impl EulerRoe {
    pub fn new(res: &SchemeResources, arena: &mut BufferArena) -> Result<Self, String> {
        let device = &res.ctx.device;
        let eigen_pipeline = res.program.kernel(res.ctx, "calc_eigen_basis")?;
        let dq_pipeline = res.program.kernel(res.ctx, "calc_delta_qtilde")?;
        let flux_pipeline = res.program.kernel(res.ctx, "calc_flux")?;
        let flux_deriv_pipeline = res.program.kernel(res.ctx, "calc_flux_deriv")?;
        let timestep_pipeline = res.program.kernel(res.ctx, "calc_cell_timestep_eig")?;

        let esd = res.dim as u64 + 2;
        let faces = res.volume as u64 * res.dim as u64;
        let eigenvalues = arena.alloc(device, faces * esd * 4, "eigenvaluesBuffer");
        let eigenvectors = arena.alloc(device, faces * esd * esd * 2 * 4, "eigenvectorsBuffer");
        let delta_qtilde = arena.alloc(device, faces * esd * 4, "deltaQTildeBuffer");

        let eigen_bind = bind_group(
            device,
            &eigen_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::EIGENVALUES, &eigenvalues),
                (slots::EIGENVECTORS, &eigenvectors),
            ],
        );
        let dq_bind = bind_group(
            device,
            &dq_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::EIGENVECTORS, &eigenvectors),
                (slots::DELTA_QTILDE, &delta_qtilde),
            ],
        );
        let flux_bind = bind_group(
            device,
            &flux_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::STEP_PARAMS, res.step_params),
                (slots::FLUX, res.flux),
                (slots::EIGENVALUES, &eigenvalues),
                (slots::EIGENVECTORS, &eigenvectors),
                (slots::DELTA_QTILDE, &delta_qtilde),
            ],
        );
        let timestep_bind = bind_group(
            device,
            &timestep_pipeline,
            &[
                (slots::STEP_PARAMS, res.step_params),
                (slots::CFL_METRIC, res.cfl_metric),
                (slots::EIGENVALUES, &eigenvalues),
            ],
        );

        Ok(Self {
            eigen_pipeline,
            dq_pipeline,
            flux_pipeline,
            flux_deriv_pipeline,
            timestep_pipeline,
            eigen_bind,
            dq_bind,
            flux_bind,
            timestep_bind,
            volume: res.volume,
            dim: res.dim,
        })
    }
}

impl FluxScheme for EulerRoe {
    fn kind(&self) -> SchemeKind {
        SchemeKind::EulerRoe
    }

    // The eigenbasis is valid for the whole unsplit step, so it is computed
    // once here rather than per stage.
    fn begin_step(&self, _ctx: &GpuContext, encoder: &mut wgpu::CommandEncoder) {
        encode_dispatch(encoder, &self.eigen_pipeline, &self.eigen_bind, self.volume * self.dim);
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
        let faces = self.volume * self.dim;
        encode_dispatch(encoder, &self.dq_pipeline, &self.dq_bind, faces);
        encode_dispatch(encoder, &self.flux_pipeline, &self.flux_bind, faces);
        let flux_deriv_bind = bind_group(
            &ctx.device,
            &self.flux_deriv_pipeline,
            &[(slots::FLUX, flux), (slots::DERIV, deriv)],
        );
        encode_dispatch(encoder, &self.flux_deriv_pipeline, &flux_deriv_bind, self.volume);
    }
}
