use wgpu::util::DeviceExt;

use super::roe::roe_core_fragment;
use super::{FluxScheme, SchemeKind, SchemeResources};
use crate::solver::codegen::slots;
use crate::solver::config::{FluxFlagPolicy, SolverConfig};
use crate::solver::gpu::buffers::BufferArena;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::program::{bind_group, encode_dispatch};
use crate::solver::gpu::structs::FillParams;

const MHD_EIGEN_SPACE_DIM: u32 = 7;

pub(super) fn sources(config: &SolverConfig) -> Vec<String> {
    let sentinel = config.flux_flag.sentinel;
    vec![
        roe_core_fragment(MHD_EIGEN_SPACE_DIM),
        format!(
            "const FLUX_FLAG_CLEAR: u32 = {}u;\n\
             const FLUX_FLAG_DEGENERATE: u32 = {}u;\n{}",
            sentinel,
            sentinel.wrapping_add(1),
            MHD_ROE_WGSL,
        ),
    ]
}

// Seven-wave Roe eigensystem of ideal MHD (Roe & Balsara normalization).
// The normal field component carries no flux and is excluded from the
// eigen space; the seven characteristic channels are mapped onto the
// eight state channels per face axis. Faces where the eigensystem
// degenerates fall back to an HLL flux and are flagged.
const MHD_ROE_WGSL: &str = r#"
fn char_state_channel(k: u32, d: u32) -> u32 {
    let t1 = (d + 1u) % 3u;
    let t2 = (d + 2u) % 3u;
    switch k {
        case 0u: { return 0u; }
        case 1u: { return 1u + d; }
        case 2u: { return 1u + t1; }
        case 3u: { return 1u + t2; }
        case 4u: { return 4u + t1; }
        case 5u: { return 4u + t2; }
        default: { return 7u; }
    }
}

fn mhd_hll_fallback(t: u32, i: u32, l: u32, d: u32) {
    let vnl = vcomp(eq_velocity(l), d);
    let vnr = vcomp(eq_velocity(i), d);
    let cl = eq_fast_speed(l, d);
    let cr = eq_fast_speed(i, d);
    let sl = min(vnl - cl, vnr - cr);
    let sr = max(vnl + cl, vnr + cr);
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
    let ebase = t * EIGEN_SPACE_DIM;
    eigenvalues[ebase] = sl;
    for (var k = 1u; k < EIGEN_SPACE_DIM - 1u; k = k + 1u) {
        eigenvalues[ebase + k] = 0.5 * (sl + sr);
    }
    eigenvalues[ebase + EIGEN_SPACE_DIM - 1u] = sr;
    flux_flag[t] = FLUX_FLAG_DEGENERATE;
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
    let rho = wl * wr;
    let v = (eq_velocity(l) * wl + eq_velocity(i) * wr) * inv;
    let b = 0.5 * (eq_magnetic(l) + eq_magnetic(i));
    let p = 0.5 * (eq_pressure(l) + eq_pressure(i));

    let t1 = (d + 1u) % 3u;
    let t2 = (d + 2u) % 3u;
    let bn = vcomp(b, d);
    let bt1 = vcomp(b, t1);
    let bt2 = vcomp(b, t2);
    let a2 = GAMMA * p / rho;
    let b2 = dot(b, b) / rho;
    let bn2 = bn * bn / rho;
    let disc = sqrt(max((a2 + b2) * (a2 + b2) - 4.0 * a2 * bn2, 0.0));
    let cf2 = 0.5 * (a2 + b2 + disc);
    let cs2 = 0.5 * (a2 + b2 - disc);
    let bt_sq = bt1 * bt1 + bt2 * bt2;

    let eps = 1e-7;
    if (rho <= 0.0 || p <= 0.0 || a2 <= 0.0
        || bn2 <= eps * cf2
        || bt_sq <= eps * rho * cf2
        || cf2 - cs2 <= eps * cf2) {
        mhd_hll_fallback(t, i, l, d);
        return;
    }
    flux_flag[t] = FLUX_FLAG_CLEAR;

    let a = sqrt(a2);
    let cf = sqrt(cf2);
    let cs = sqrt(max(cs2, 0.0));
    let ca = sqrt(bn2);
    let alphaf2 = clamp((a2 - cs2) / (cf2 - cs2), 0.0, 1.0);
    let alphaf = sqrt(alphaf2);
    let alphas = sqrt(1.0 - alphaf2);
    let btmag = sqrt(bt_sq);
    let bty = bt1 / btmag;
    let btz = bt2 / btmag;
    var sgn = 1.0;
    if (bn < 0.0) {
        sgn = -1.0;
    }
    let sqrho = sqrt(rho);
    let vn = vcomp(v, d);
    let vt1 = vcomp(v, t1);
    let vt2 = vcomp(v, t2);

    let ebase = t * EIGEN_SPACE_DIM;
    eigenvalues[ebase + 0u] = vn - cf;
    eigenvalues[ebase + 1u] = vn - ca;
    eigenvalues[ebase + 2u] = vn - cs;
    eigenvalues[ebase + 3u] = vn;
    eigenvalues[ebase + 4u] = vn + cs;
    eigenvalues[ebase + 5u] = vn + ca;
    eigenvalues[ebase + 6u] = vn + cf;

    // primitive-variable eigenvectors, component order
    // (rho, u_n, u_t1, u_t2, B_t1, B_t2, p)
    var rp: array<array<f32, 7>, 7>;
    var lp: array<array<f32, 7>, 7>;
    let half_inv_a2 = 0.5 / a2;
    for (var pass_ = 0u; pass_ < 2u; pass_ = pass_ + 1u) {
        var sigma = -1.0;
        var kf = 0u;
        var ks = 2u;
        var ka = 1u;
        if (pass_ == 1u) {
            sigma = 1.0;
            kf = 6u;
            ks = 4u;
            ka = 5u;
        }
        rp[0][kf] = rho * alphaf;
        rp[1][kf] = sigma * alphaf * cf;
        rp[2][kf] = -sigma * alphas * cs * bty * sgn;
        rp[3][kf] = -sigma * alphas * cs * btz * sgn;
        rp[4][kf] = alphas * a * bty * sqrho;
        rp[5][kf] = alphas * a * btz * sqrho;
        rp[6][kf] = alphaf * rho * a2;
        lp[kf][1] = sigma * alphaf * cf * half_inv_a2;
        lp[kf][2] = -sigma * alphas * cs * bty * sgn * half_inv_a2;
        lp[kf][3] = -sigma * alphas * cs * btz * sgn * half_inv_a2;
        lp[kf][4] = alphas * a * bty / sqrho * half_inv_a2;
        lp[kf][5] = alphas * a * btz / sqrho * half_inv_a2;
        lp[kf][6] = alphaf / rho * half_inv_a2;

        rp[0][ks] = rho * alphas;
        rp[1][ks] = sigma * alphas * cs;
        rp[2][ks] = sigma * alphaf * cf * bty * sgn;
        rp[3][ks] = sigma * alphaf * cf * btz * sgn;
        rp[4][ks] = -alphaf * a * bty * sqrho;
        rp[5][ks] = -alphaf * a * btz * sqrho;
        rp[6][ks] = alphas * rho * a2;
        lp[ks][1] = sigma * alphas * cs * half_inv_a2;
        lp[ks][2] = sigma * alphaf * cf * bty * sgn * half_inv_a2;
        lp[ks][3] = sigma * alphaf * cf * btz * sgn * half_inv_a2;
        lp[ks][4] = -alphaf * a * bty / sqrho * half_inv_a2;
        lp[ks][5] = -alphaf * a * btz / sqrho * half_inv_a2;
        lp[ks][6] = alphas / rho * half_inv_a2;

        rp[2][ka] = -btz;
        rp[3][ka] = bty;
        rp[4][ka] = -sigma * sgn * sqrho * btz;
        rp[5][ka] = sigma * sgn * sqrho * bty;
        lp[ka][2] = -0.5 * btz;
        lp[ka][3] = 0.5 * bty;
        lp[ka][4] = -0.5 * sigma * sgn * btz / sqrho;
        lp[ka][5] = 0.5 * sigma * sgn * bty / sqrho;
    }
    rp[0][3] = 1.0;
    lp[3][0] = 1.0;
    lp[3][6] = -1.0 / a2;

    // transform into conservative space with the jacobian of
    // (rho, m_n, m_t1, m_t2, B_t1, B_t2, E) wrt the primitives
    let vsq = dot(v, v);
    let g1 = GAMMA - 1.0;
    let rbase = t * EIGEN_TRANSFORM_SIZE;
    let lbase = rbase + EIGEN_SPACE_DIM * EIGEN_SPACE_DIM;
    for (var k = 0u; k < 7u; k = k + 1u) {
        let r0 = rp[0][k];
        let r1 = rp[1][k];
        let r2 = rp[2][k];
        let r3 = rp[3][k];
        let r4 = rp[4][k];
        let r5 = rp[5][k];
        let r6 = rp[6][k];
        eigenvectors[rbase + 0u * 7u + k] = r0;
        eigenvectors[rbase + 1u * 7u + k] = vn * r0 + rho * r1;
        eigenvectors[rbase + 2u * 7u + k] = vt1 * r0 + rho * r2;
        eigenvectors[rbase + 3u * 7u + k] = vt2 * r0 + rho * r3;
        eigenvectors[rbase + 4u * 7u + k] = r4;
        eigenvectors[rbase + 5u * 7u + k] = r5;
        eigenvectors[rbase + 6u * 7u + k] = 0.5 * vsq * r0 + rho * vn * r1
            + rho * vt1 * r2 + rho * vt2 * r3 + bt1 * r4 + bt2 * r5 + r6 / g1;

        let l0 = lp[k][0];
        let l1 = lp[k][1];
        let l2 = lp[k][2];
        let l3 = lp[k][3];
        let l4 = lp[k][4];
        let l5 = lp[k][5];
        let l6 = lp[k][6];
        eigenvectors[lbase + k * 7u + 0u] = l0 - (l1 * vn + l2 * vt1 + l3 * vt2) / rho
            + l6 * 0.5 * g1 * vsq;
        eigenvectors[lbase + k * 7u + 1u] = l1 / rho - l6 * g1 * vn;
        eigenvectors[lbase + k * 7u + 2u] = l2 / rho - l6 * g1 * vt1;
        eigenvectors[lbase + k * 7u + 3u] = l3 / rho - l6 * g1 * vt2;
        eigenvectors[lbase + k * 7u + 4u] = l4 - l6 * g1 * bt1;
        eigenvectors[lbase + k * 7u + 5u] = l5 - l6 * g1 * bt2;
        eigenvectors[lbase + k * 7u + 6u] = l6 * g1;
    }
}

@compute @workgroup_size(64)
fn calc_mhd_flux(
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
    if (flux_flag[t] != FLUX_FLAG_CLEAR) {
        return;
    }
    roe_flux_at(t);
}

@compute @workgroup_size(64)
fn fill_flux_flag(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let t = global_index(gid, nwg);
    if (t >= VOLUME * DIM) {
        return;
    }
    flux_flag[t] = fill_params.value;
}
"#;

pub struct MhdRoe {
    eigen_pipeline: wgpu::ComputePipeline,
    dq_pipeline: wgpu::ComputePipeline,
    flux_pipeline: wgpu::ComputePipeline,
    flux_deriv_pipeline: wgpu::ComputePipeline,
    timestep_pipeline: wgpu::ComputePipeline,
    fill_pipeline: wgpu::ComputePipeline,
    flux_flag: wgpu::Buffer,
    eigen_bind: wgpu::BindGroup,
    dq_bind: wgpu::BindGroup,
    flux_bind: wgpu::BindGroup,
    timestep_bind: wgpu::BindGroup,
    fill_bind: wgpu::BindGroup,
    policy: FluxFlagPolicy,
    volume: u32,
    dim: u32,
}

impl MhdRoe {
    pub fn new(
        res: &SchemeResources,
        arena: &mut BufferArena,
        config: &SolverConfig,
    ) -> Result<Self, String> {
        let device = &res.ctx.device;
        let eigen_pipeline = res.program.kernel(res.ctx, "calc_eigen_basis")?;
        let dq_pipeline = res.program.kernel(res.ctx, "calc_delta_qtilde")?;
        let flux_pipeline = res.program.kernel(res.ctx, "calc_mhd_flux")?;
        let flux_deriv_pipeline = res.program.kernel(res.ctx, "calc_flux_deriv")?;
        let timestep_pipeline = res.program.kernel(res.ctx, "calc_cell_timestep_eig")?;
        let fill_pipeline = res.program.kernel(res.ctx, "fill_flux_flag")?;

        let esd = MHD_EIGEN_SPACE_DIM as u64;
        let faces = res.volume as u64 * res.dim as u64;
        let eigenvalues = arena.alloc(device, faces * esd * 4, "eigenvaluesBuffer");
        let eigenvectors = arena.alloc(device, faces * esd * esd * 2 * 4, "eigenvectorsBuffer");
        let delta_qtilde = arena.alloc(device, faces * esd * 4, "deltaQTildeBuffer");
        let flux_flag = arena.alloc(device, faces * 4, "fluxFlagBuffer");

        let fill_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fluxFlagFillParams"),
            contents: bytemuck::bytes_of(&FillParams {
                value: config.flux_flag.sentinel,
                pad: [0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let eigen_bind = bind_group(
            device,
            &eigen_pipeline,
            &[
                (slots::STATE, res.state),
                (slots::FLUX, res.flux),
                (slots::EIGENVALUES, &eigenvalues),
                (slots::EIGENVECTORS, &eigenvectors),
                (slots::FLUX_FLAG, &flux_flag),
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
                (slots::FLUX_FLAG, &flux_flag),
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
        let fill_bind = bind_group(
            device,
            &fill_pipeline,
            &[
                (slots::FLUX_FLAG, &flux_flag),
                (slots::FILL_PARAMS, &fill_params),
            ],
        );

        Ok(Self {
            eigen_pipeline,
            dq_pipeline,
            flux_pipeline,
            flux_deriv_pipeline,
            timestep_pipeline,
            fill_pipeline,
            flux_flag,
            eigen_bind,
            dq_bind,
            flux_bind,
            timestep_bind,
            fill_bind,
            policy: config.flux_flag,
            volume: res.volume,
            dim: res.dim,
        })
    }
}

impl FluxScheme for MhdRoe {
    fn kind(&self) -> SchemeKind {
        SchemeKind::MhdRoe
    }

    fn begin_step(&self, _ctx: &GpuContext, encoder: &mut wgpu::CommandEncoder) {
        let faces = self.volume * self.dim;
        if self.policy.reset_each_step {
            encode_dispatch(encoder, &self.fill_pipeline, &self.fill_bind, faces);
        }
        encode_dispatch(encoder, &self.eigen_pipeline, &self.eigen_bind, faces);
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

    fn flux_flag(&self) -> Option<&wgpu::Buffer> {
        Some(&self.flux_flag)
    }
}
