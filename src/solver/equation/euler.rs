use super::{BoundaryKernelKind, EquationDescriptor};
use crate::solver::config::{BoundaryMethod, InitialCell};
use crate::solver::grid::Grid;

/// Compressible Euler equations. Channels: density, one momentum component
/// per active axis, total energy.
pub struct Euler;

impl EquationDescriptor for Euler {
    fn name(&self) -> &'static str {
        "Euler"
    }

    fn num_states(&self, dim: usize) -> usize {
        dim + 2
    }

    fn channel_names(&self, dim: usize) -> Vec<&'static str> {
        let mut names = vec!["density"];
        names.extend_from_slice(&["momentumX", "momentumY", "momentumZ"][..dim]);
        names.push("energyTotal");
        names
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
                // normal momentum changes sign
                if channel == 1 + axis {
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
            // the potential has no meaningful mirror image; clamp it
            BoundaryMethod::Mirror | BoundaryMethod::FreeFlow => {
                Some(BoundaryKernelKind::FreeFlow)
            }
        }
    }

    fn source_fragments(&self, _grid: &Grid) -> Vec<String> {
        vec![EULER_WGSL.to_string()]
    }

    fn pack_initial(&self, dim: usize, cell: &InitialCell, out: &mut [f32]) {
        out[0] = cell.density;
        for d in 0..dim {
            out[1 + d] = cell.momentum[d];
        }
        out[dim + 1] = cell.energy_total;
    }
}

/// Pointwise primitive helpers and the analytic flux for the Euler system.
/// Referenced by every flux scheme fragment.
const EULER_WGSL: &str = r#"
fn eq_density(i: u32) -> f32 {
    return state[i * NUM_STATES];
}

fn eq_momentum(i: u32, d: u32) -> f32 {
    return state[i * NUM_STATES + 1u + d];
}

fn eq_energy(i: u32) -> f32 {
    return state[i * NUM_STATES + NUM_STATES - 1u];
}

fn eq_velocity(i: u32) -> vec3<f32> {
    let rho = eq_density(i);
    var v = vec3<f32>(0.0, 0.0, 0.0);
    for (var d = 0u; d < DIM; d = d + 1u) {
        v[d] = eq_momentum(i, d) / rho;
    }
    return v;
}

fn eq_pressure(i: u32) -> f32 {
    let rho = eq_density(i);
    let v = eq_velocity(i);
    return (GAMMA - 1.0) * max(eq_energy(i) - 0.5 * rho * dot(v, v), 1e-20);
}

fn eq_sound_speed(i: u32) -> f32 {
    return sqrt(GAMMA * eq_pressure(i) / eq_density(i));
}

fn eq_max_wave_speed(i: u32, d: u32) -> f32 {
    return abs(vcomp(eq_velocity(i), d)) + eq_sound_speed(i);
}

fn eq_flux_comp(i: u32, d: u32, s: u32) -> f32 {
    let vn = vcomp(eq_velocity(i), d);
    if (s == 0u) {
        return eq_density(i) * vn;
    }
    let p = eq_pressure(i);
    if (s == NUM_STATES - 1u) {
        return (eq_energy(i) + p) * vn;
    }
    let e = s - 1u;
    var f = eq_momentum(i, e) * vn;
    if (e == d) {
        f = f + p;
    }
    return f;
}
"#;
