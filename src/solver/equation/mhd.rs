use super::{BoundaryKernelKind, EquationDescriptor};
use crate::solver::config::{BoundaryMethod, InitialCell};
use crate::solver::grid::Grid;

/// Ideal MHD. Always eight channels regardless of grid dimensionality:
/// density, three momentum components, three magnetic field components,
/// total energy.
pub struct Mhd;

impl EquationDescriptor for Mhd {
    fn name(&self) -> &'static str {
        "MHD"
    }

    fn num_states(&self, _dim: usize) -> usize {
        8
    }

    fn channel_names(&self, _dim: usize) -> Vec<&'static str> {
        vec![
            "density",
            "momentumX",
            "momentumY",
            "momentumZ",
            "magneticFieldX",
            "magneticFieldY",
            "magneticFieldZ",
            "energyTotal",
        ]
    }

    fn state_boundary_kernel(
        &self,
        method: BoundaryMethod,
        axis: usize,
        channel: usize,
    ) -> Option<BoundaryKernelKind> {
        match method {
            BoundaryMethod::None => None,
            BoundaryMethod::Periodic => Some(BoundaryKernelKind::Periodic),
            BoundaryMethod::FreeFlow => Some(BoundaryKernelKind::FreeFlow),
            BoundaryMethod::Mirror => {
                // normal momentum and normal magnetic field change sign
                if channel == 1 + axis || channel == 4 + axis {
                    Some(BoundaryKernelKind::Reflect)
                } else {
                    Some(BoundaryKernelKind::Mirror)
                }
            }
        }
    }

    fn gravity_boundary_kernel(&self, method: BoundaryMethod) -> Option<BoundaryKernelKind> {
        match method {
            BoundaryMethod::None => None,
            BoundaryMethod::Periodic => Some(BoundaryKernelKind::Periodic),
            BoundaryMethod::Mirror | BoundaryMethod::FreeFlow => {
                Some(BoundaryKernelKind::FreeFlow)
            }
        }
    }

    fn source_fragments(&self, _grid: &Grid) -> Vec<String> {
        vec![MHD_WGSL.to_string()]
    }

    fn pack_initial(&self, _dim: usize, cell: &InitialCell, out: &mut [f32]) {
        out[0] = cell.density;
        out[1] = cell.momentum[0];
        out[2] = cell.momentum[1];
        out[3] = cell.momentum[2];
        out[4] = cell.magnetic[0];
        out[5] = cell.magnetic[1];
        out[6] = cell.magnetic[2];
        out[7] = cell.energy_total;
    }
}

/// Pointwise primitives and the analytic flux for ideal MHD. Gas pressure
/// excludes, total pressure includes, the magnetic contribution.
const MHD_WGSL: &str = r#"
fn eq_density(i: u32) -> f32 {
    return state[i * NUM_STATES];
}

fn eq_momentum(i: u32, d: u32) -> f32 {
    return state[i * NUM_STATES + 1u + d];
}

fn eq_magnetic(i: u32) -> vec3<f32> {
    let base = i * NUM_STATES;
    return vec3<f32>(state[base + 4u], state[base + 5u], state[base + 6u]);
}

fn eq_energy(i: u32) -> f32 {
    return state[i * NUM_STATES + 7u];
}

fn eq_velocity(i: u32) -> vec3<f32> {
    let rho = eq_density(i);
    let base = i * NUM_STATES;
    return vec3<f32>(state[base + 1u], state[base + 2u], state[base + 3u]) / rho;
}

fn eq_pressure(i: u32) -> f32 {
    let rho = eq_density(i);
    let v = eq_velocity(i);
    let b = eq_magnetic(i);
    return (GAMMA - 1.0)
        * max(eq_energy(i) - 0.5 * rho * dot(v, v) - 0.5 * dot(b, b), 1e-20);
}

fn eq_total_pressure(i: u32) -> f32 {
    let b = eq_magnetic(i);
    return eq_pressure(i) + 0.5 * dot(b, b);
}

fn eq_sound_speed(i: u32) -> f32 {
    return sqrt(GAMMA * eq_pressure(i) / eq_density(i));
}

fn eq_fast_speed(i: u32, d: u32) -> f32 {
    let rho = eq_density(i);
    let b = eq_magnetic(i);
    let a2 = GAMMA * eq_pressure(i) / rho;
    let b2 = dot(b, b) / rho;
    let bn2 = vcomp(b, d) * vcomp(b, d) / rho;
    let sum = a2 + b2;
    return sqrt(0.5 * (sum + sqrt(max(sum * sum - 4.0 * a2 * bn2, 0.0))));
}

fn eq_max_wave_speed(i: u32, d: u32) -> f32 {
    return abs(vcomp(eq_velocity(i), d)) + eq_fast_speed(i, d);
}

fn eq_flux_comp(i: u32, d: u32, s: u32) -> f32 {
    let v = eq_velocity(i);
    let b = eq_magnetic(i);
    let vn = vcomp(v, d);
    let bn = vcomp(b, d);
    if (s == 0u) {
        return eq_density(i) * vn;
    }
    if (s == 7u) {
        return (eq_energy(i) + eq_total_pressure(i)) * vn - bn * dot(v, b);
    }
    if (s < 4u) {
        let e = s - 1u;
        var f = eq_momentum(i, e) * vn - vcomp(b, e) * bn;
        if (e == d) {
            f = f + eq_total_pressure(i);
        }
        return f;
    }
    let e = s - 4u;
    return vcomp(b, e) * vn - vcomp(v, e) * bn;
}
"#;
