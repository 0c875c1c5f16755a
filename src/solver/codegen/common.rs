use crate::solver::grid::Grid;

/// Binding slots shared by every kernel in the assembled program. Slots are
/// module-global; each pipeline's implicit layout only picks up the slots
/// its entry point actually references.
pub mod slots {
    pub const STATE: u32 = 0;
    pub const STEP_PARAMS: u32 = 1;
    pub const CFL_METRIC: u32 = 2;
    pub const POTENTIAL: u32 = 3;
    pub const DERIV: u32 = 4;
    pub const FLUX: u32 = 5;
    pub const EIGENVALUES: u32 = 6;
    pub const EIGENVECTORS: u32 = 7;
    pub const DELTA_QTILDE: u32 = 8;
    pub const INTERFACE_VELOCITY: u32 = 9;
    pub const REDUCE_SRC: u32 = 10;
    pub const REDUCE_DST: u32 = 11;
    pub const BC_FIELD: u32 = 12;
    pub const BC_PARAMS: u32 = 13;
    pub const COMBINE_DST: u32 = 14;
    pub const COMBINE_A: u32 = 15;
    pub const COMBINE_B: u32 = 16;
    pub const COMBINE_PARAMS: u32 = 17;
    pub const FLUX_FLAG: u32 = 18;
    pub const PRESSURE: u32 = 19;
    pub const POISSON_SRC: u32 = 20;
    pub const POISSON_DST: u32 = 21;
    pub const DISPLAY_OUT: u32 = 22;
    pub const REDUCE_PARAMS: u32 = 23;
    pub const FILL_PARAMS: u32 = 24;
}

/// Shared utility fragment: resource declarations, index helpers, boundary
/// kernels for every active axis, the min-reduction kernel, the integrator
/// combine kernels, the Poisson relaxation and gravity source kernels, the
/// shared flux-divergence kernel and the display conversion.
pub fn common_fragment(grid: &Grid) -> String {
    let mut out = String::from(COMMON_FIXED);
    for d in 0..grid.dim() {
        out.push_str(&boundary_kernels_for_axis(d));
    }
    out
}

const COMMON_FIXED: &str = r#"
struct StepParams {
    dt: f32,
    cfl: f32,
    pad0: f32,
    pad1: f32,
}

struct BcParams {
    nchan: u32,
    chan: u32,
    side: u32,
    pad: u32,
}

struct ReduceParams {
    n: u32,
    pad0: u32,
    pad1: u32,
    pad2: u32,
}

struct CombineParams {
    scale: f32,
    pad0: f32,
    pad1: f32,
    pad2: f32,
}

struct FillParams {
    value: u32,
    pad0: u32,
    pad1: u32,
    pad2: u32,
}

@group(0) @binding(0) var<storage, read_write> state: array<f32>;
@group(0) @binding(1) var<uniform> step_params: StepParams;
@group(0) @binding(2) var<storage, read_write> cfl_metric: array<f32>;
@group(0) @binding(3) var<storage, read> potential: array<f32>;
@group(0) @binding(4) var<storage, read_write> deriv: array<f32>;
@group(0) @binding(5) var<storage, read_write> flux: array<f32>;
@group(0) @binding(6) var<storage, read_write> eigenvalues: array<f32>;
@group(0) @binding(7) var<storage, read_write> eigenvectors: array<f32>;
@group(0) @binding(8) var<storage, read_write> delta_qtilde: array<f32>;
@group(0) @binding(9) var<storage, read_write> interface_velocity: array<f32>;
@group(0) @binding(10) var<storage, read> reduce_src: array<f32>;
@group(0) @binding(11) var<storage, read_write> reduce_dst: array<f32>;
@group(0) @binding(12) var<storage, read_write> bc_field: array<f32>;
@group(0) @binding(13) var<uniform> bc_params: BcParams;
@group(0) @binding(14) var<storage, read_write> combine_dst: array<f32>;
@group(0) @binding(15) var<storage, read> combine_a: array<f32>;
@group(0) @binding(16) var<storage, read> combine_b: array<f32>;
@group(0) @binding(17) var<uniform> combine_params: CombineParams;
@group(0) @binding(18) var<storage, read_write> flux_flag: array<u32>;
@group(0) @binding(19) var<storage, read_write> pressure: array<f32>;
@group(0) @binding(20) var<storage, read> poisson_src: array<f32>;
@group(0) @binding(21) var<storage, read_write> poisson_dst: array<f32>;
@group(0) @binding(22) var<storage, read_write> display_out: array<vec4<f32>>;
@group(0) @binding(23) var<uniform> reduce_params: ReduceParams;
@group(0) @binding(24) var<uniform> fill_params: FillParams;

const F32_MAX: f32 = 3.40282347e38;
const FOUR_PI: f32 = 12.566370614359172;

fn vcomp(v: vec3<f32>, d: u32) -> f32 {
    var t = v;
    return t[d];
}

fn ucomp(v: vec3<u32>, d: u32) -> u32 {
    var t = v;
    return t[d];
}

fn axis_size(d: u32) -> u32 {
    return ucomp(vec3<u32>(SIZE_X, SIZE_Y, SIZE_Z), d);
}

fn axis_step(d: u32) -> u32 {
    return ucomp(vec3<u32>(STEP_X, STEP_Y, STEP_Z), d);
}

fn axis_dx(d: u32) -> f32 {
    return vcomp(vec3<f32>(DX, DY, DZ), d);
}

fn cell_coord(i: u32) -> vec3<u32> {
    return vec3<u32>(i % SIZE_X, (i / SIZE_X) % SIZE_Y, i / (SIZE_X * SIZE_Y));
}

fn cell_index(c: vec3<u32>) -> u32 {
    return c.x + c.y * STEP_Y + c.z * STEP_Z;
}

// Dispatches wider than the per-dimension workgroup limit are split over
// two grid axes; this recovers the linear invocation index.
fn global_index(gid: vec3<u32>, nwg: vec3<u32>) -> u32 {
    return gid.x + gid.y * nwg.x * 64u;
}

// Written additively: a collapsed axis has size 1 and subtracting 2u from it would
// overflow as a const expression even inside the dead branch.
fn is_interior(c: vec3<u32>) -> bool {
    var ok = c.x >= 2u && c.x + 2u < SIZE_X;
    if (DIM > 1u) {
        ok = ok && c.y >= 2u && c.y + 2u < SIZE_Y;
    }
    if (DIM > 2u) {
        ok = ok && c.z >= 2u && c.z + 2u < SIZE_Z;
    }
    return ok;
}

// A face owned by cell `c` along axis `d` sits on the minus side of the
// cell. Faces are evaluated for one extra layer along `d` so every interior
// cell sees both of its faces.
fn is_flux_face(c: vec3<u32>, d: u32) -> bool {
    var ok = true;
    for (var e = 0u; e < DIM; e = e + 1u) {
        let ce = ucomp(c, e);
        let n = axis_size(e);
        if (e == d) {
            ok = ok && ce >= 2u && ce <= n - 2u;
        } else {
            ok = ok && ce >= 2u && ce < n - 2u;
        }
    }
    return ok;
}

// ---- timestep reduction ----

var<workgroup> reduce_shared: array<f32, 64>;

@compute @workgroup_size(64)
fn reduce_min(
    @builtin(local_invocation_index) lid: u32,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let group = wid.x + wid.y * nwg.x;
    let t = group * 64u + lid;
    var v = F32_MAX;
    if (t < reduce_params.n) {
        v = reduce_src[t];
    }
    reduce_shared[lid] = v;
    workgroupBarrier();
    var stride = 32u;
    loop {
        if (stride == 0u) {
            break;
        }
        if (lid < stride) {
            reduce_shared[lid] = min(reduce_shared[lid], reduce_shared[lid + stride]);
        }
        workgroupBarrier();
        stride = stride >> 1u;
    }
    // a split dispatch can carry whole workgroups past the input
    if (lid == 0u && group * 64u < reduce_params.n) {
        reduce_dst[group] = reduce_shared[0];
    }
}

// ---- integrator combine kernels ----

@compute @workgroup_size(64)
fn combine(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= NUM_STATES * VOLUME) {
        return;
    }
    combine_dst[i] = combine_a[i] + combine_b[i] * combine_params.scale;
}

@compute @workgroup_size(64)
fn accumulate(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= NUM_STATES * VOLUME) {
        return;
    }
    combine_dst[i] = combine_dst[i] + combine_b[i] * combine_params.scale;
}

// ---- self gravitation ----

// One Jacobi sweep of grad^2 phi = -4 pi G rho, ping-ponged between the two
// potential buffers. Ghost cells carry their boundary values through.
@compute @workgroup_size(64)
fn poisson_relax(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= VOLUME) {
        return;
    }
    let c = cell_coord(i);
    if (!is_interior(c)) {
        poisson_dst[i] = poisson_src[i];
        return;
    }
    var num = FOUR_PI * GRAVITATIONAL_CONSTANT * state[i * NUM_STATES];
    var den = 0.0;
    for (var d = 0u; d < DIM; d = d + 1u) {
        let s = axis_step(d);
        let h2 = axis_dx(d) * axis_dx(d);
        num = num + (poisson_src[i + s] + poisson_src[i - s]) / h2;
        den = den + 2.0 / h2;
    }
    poisson_dst[i] = num / den;
}

// Gravitational contribution to the state derivative: momentum gains
// rho * grad(phi), energy gains the corresponding work. Sign follows the
// grad^2 phi = -4 pi G rho convention above.
@compute @workgroup_size(64)
fn gravity_deriv(
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
    let rho = state[i * NUM_STATES];
    for (var d = 0u; d < DIM; d = d + 1u) {
        let s = axis_step(d);
        let grad = (potential[i + s] - potential[i - s]) / (2.0 * axis_dx(d));
        deriv[i * NUM_STATES + 1u + d] = deriv[i * NUM_STATES + 1u + d] + rho * grad;
        deriv[i * NUM_STATES + NUM_STATES - 1u] =
            deriv[i * NUM_STATES + NUM_STATES - 1u] + state[i * NUM_STATES + 1u + d] * grad;
    }
}

// ---- shared flux divergence ----

@compute @workgroup_size(64)
fn calc_flux_deriv(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= VOLUME) {
        return;
    }
    let c = cell_coord(i);
    let base = i * NUM_STATES;
    if (!is_interior(c)) {
        for (var s = 0u; s < NUM_STATES; s = s + 1u) {
            deriv[base + s] = 0.0;
        }
        return;
    }
    for (var s = 0u; s < NUM_STATES; s = s + 1u) {
        var div = 0.0;
        for (var d = 0u; d < DIM; d = d + 1u) {
            let left = (i * DIM + d) * NUM_STATES + s;
            let right = ((i + axis_step(d)) * DIM + d) * NUM_STATES + s;
            div = div + (flux[right] - flux[left]) / axis_dx(d);
        }
        deriv[base + s] = -div;
    }
}

// ---- per-cell stability metric from raw state ----

@compute @workgroup_size(64)
fn calc_cell_timestep(
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
        let s = eq_max_wave_speed(i, d);
        if (s > 0.0) {
            m = min(m, axis_dx(d) / s);
        }
    }
    cfl_metric[i] = m * step_params.cfl;
}

// ---- display conversion ----

@compute @workgroup_size(64)
fn convert_to_display(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let i = global_index(gid, nwg);
    if (i >= VOLUME) {
        return;
    }
    let rho = eq_density(i);
    let v = eq_velocity(i);
    display_out[i] = vec4<f32>(rho, length(v), eq_pressure(i), potential[i]);
}
"#;

/// Ghost-layer update kernels for one axis: each invocation handles one
/// cross-section line and writes the two ghost cells on the side selected
/// by `bc_params.side`.
fn boundary_kernels_for_axis(d: usize) -> String {
    let axis = ["x", "y", "z"][d];
    let n = ["SIZE_X", "SIZE_Y", "SIZE_Z"][d];
    let (cross, decode, addr): (&str, &str, Box<dyn Fn(&str) -> String>) = match d {
        0 => (
            "SIZE_Y * SIZE_Z",
            "    let cy = i % SIZE_Y;\n    let cz = i / SIZE_Y;\n",
            Box::new(|g: &str| format!("bc_addr(vec3<u32>({}, cy, cz))", g)),
        ),
        1 => (
            "SIZE_X * SIZE_Z",
            "    let cx = i % SIZE_X;\n    let cz = i / SIZE_X;\n",
            Box::new(|g: &str| format!("bc_addr(vec3<u32>(cx, {}, cz))", g)),
        ),
        _ => (
            "SIZE_X * SIZE_Y",
            "    let cx = i % SIZE_X;\n    let cy = i / SIZE_X;\n",
            Box::new(|g: &str| format!("bc_addr(vec3<u32>(cx, cy, {}))", g)),
        ),
    };

    let header = |kind: &str| {
        format!(
            "@compute @workgroup_size(64)\n\
             fn boundary_{kind}_{axis}(\n\
             \x20   @builtin(global_invocation_id) gid: vec3<u32>,\n\
             \x20   @builtin(num_workgroups) nwg: vec3<u32>,\n\
             ) {{\n\
             \x20   let i = global_index(gid, nwg);\n\
             \x20   if (i >= {cross}) {{\n        return;\n    }}\n\
             {decode}\
             \x20   let n = {n};\n"
        )
    };

    let mut out = String::new();
    if d == 0 {
        out.push_str(
            "\nfn bc_addr(c: vec3<u32>) -> u32 {\n    \
             return cell_index(c) * bc_params.nchan + bc_params.chan;\n}\n\n",
        );
    }

    // periodic: ghosts wrap to the far interior cells
    out.push_str(&header("periodic"));
    out.push_str(&format!(
        "    if (bc_params.side == 0u) {{\n\
         \x20       bc_field[{g0}] = bc_field[{s0}];\n\
         \x20       bc_field[{g1}] = bc_field[{s1}];\n\
         \x20   }} else {{\n\
         \x20       bc_field[{g2}] = bc_field[{s2}];\n\
         \x20       bc_field[{g3}] = bc_field[{s3}];\n\
         \x20   }}\n}}\n\n",
        g0 = addr("0u"),
        s0 = addr("n - 4u"),
        g1 = addr("1u"),
        s1 = addr("n - 3u"),
        g2 = addr("n - 1u"),
        s2 = addr("3u"),
        g3 = addr("n - 2u"),
        s3 = addr("2u"),
    ));

    // mirror: ghosts copy the reflected interior values
    out.push_str(&header("mirror"));
    out.push_str(&format!(
        "    if (bc_params.side == 0u) {{\n\
         \x20       bc_field[{g0}] = bc_field[{s0}];\n\
         \x20       bc_field[{g1}] = bc_field[{s1}];\n\
         \x20   }} else {{\n\
         \x20       bc_field[{g2}] = bc_field[{s2}];\n\
         \x20       bc_field[{g3}] = bc_field[{s3}];\n\
         \x20   }}\n}}\n\n",
        g0 = addr("0u"),
        s0 = addr("3u"),
        g1 = addr("1u"),
        s1 = addr("2u"),
        g2 = addr("n - 1u"),
        s2 = addr("n - 4u"),
        g3 = addr("n - 2u"),
        s3 = addr("n - 3u"),
    ));

    // reflect: mirrored and sign-flipped
    out.push_str(&header("reflect"));
    out.push_str(&format!(
        "    if (bc_params.side == 0u) {{\n\
         \x20       bc_field[{g0}] = -bc_field[{s0}];\n\
         \x20       bc_field[{g1}] = -bc_field[{s1}];\n\
         \x20   }} else {{\n\
         \x20       bc_field[{g2}] = -bc_field[{s2}];\n\
         \x20       bc_field[{g3}] = -bc_field[{s3}];\n\
         \x20   }}\n}}\n\n",
        g0 = addr("0u"),
        s0 = addr("3u"),
        g1 = addr("1u"),
        s1 = addr("2u"),
        g2 = addr("n - 1u"),
        s2 = addr("n - 4u"),
        g3 = addr("n - 2u"),
        s3 = addr("n - 3u"),
    ));

    // freeflow: ghosts clamp to the nearest interior cell
    out.push_str(&header("freeflow"));
    out.push_str(&format!(
        "    if (bc_params.side == 0u) {{\n\
         \x20       bc_field[{g0}] = bc_field[{s0}];\n\
         \x20       bc_field[{g1}] = bc_field[{s0b}];\n\
         \x20   }} else {{\n\
         \x20       bc_field[{g2}] = bc_field[{s2}];\n\
         \x20       bc_field[{g3}] = bc_field[{s2b}];\n\
         \x20   }}\n}}\n\n",
        g0 = addr("0u"),
        s0 = addr("2u"),
        g1 = addr("1u"),
        s0b = addr("2u"),
        g2 = addr("n - 1u"),
        s2 = addr("n - 3u"),
        g3 = addr("n - 2u"),
        s2b = addr("n - 3u"),
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_kernels_emitted_per_active_axis() {
        let g1 = Grid::new(1, [16, 1, 1], [0.0; 3], [1.0; 3]).unwrap();
        let src = common_fragment(&g1);
        assert!(src.contains("fn boundary_periodic_x"));
        assert!(!src.contains("fn boundary_periodic_y"));

        let g3 = Grid::new(3, [8, 8, 8], [0.0; 3], [1.0; 3]).unwrap();
        let src = common_fragment(&g3);
        for axis in ["x", "y", "z"] {
            for kind in ["periodic", "mirror", "reflect", "freeflow"] {
                assert!(
                    src.contains(&format!("fn boundary_{}_{}", kind, axis)),
                    "missing boundary_{}_{}",
                    kind,
                    axis
                );
            }
        }
    }

    #[test]
    fn shared_kernels_present() {
        let g = Grid::new(1, [16, 1, 1], [0.0; 3], [1.0; 3]).unwrap();
        let src = common_fragment(&g);
        for name in [
            "fn reduce_min",
            "fn combine",
            "fn accumulate",
            "fn poisson_relax",
            "fn gravity_deriv",
            "fn calc_flux_deriv",
            "fn calc_cell_timestep",
            "fn convert_to_display",
        ] {
            assert!(src.contains(name), "missing {}", name);
        }
    }
}
