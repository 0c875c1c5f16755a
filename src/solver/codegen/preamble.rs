use crate::solver::config::SolverConfig;

fn f(v: f32) -> String {
    // always produce a valid WGSL f32 literal
    let s = format!("{:?}", v);
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Macro-definition preamble: grid shape, linear strides, spacing, domain
/// bounds, state count and model constants, all resolved at assembly time.
pub fn preamble(config: &SolverConfig, num_states: usize) -> String {
    let g = &config.grid;
    let mut out = String::new();
    out.push_str(&format!("const DIM: u32 = {}u;\n", g.dim()));
    out.push_str(&format!("const SIZE_X: u32 = {}u;\n", g.size(0)));
    out.push_str(&format!("const SIZE_Y: u32 = {}u;\n", g.size(1)));
    out.push_str(&format!("const SIZE_Z: u32 = {}u;\n", g.size(2)));
    out.push_str(&format!("const STEP_X: u32 = {}u;\n", g.step(0)));
    out.push_str(&format!("const STEP_Y: u32 = {}u;\n", g.step(1)));
    out.push_str(&format!("const STEP_Z: u32 = {}u;\n", g.step(2)));
    out.push_str(&format!("const VOLUME: u32 = {}u;\n", g.volume()));
    out.push_str(&format!("const DX: f32 = {};\n", f(g.dx(0))));
    out.push_str(&format!("const DY: f32 = {};\n", f(g.dx(1))));
    out.push_str(&format!("const DZ: f32 = {};\n", f(g.dx(2))));
    out.push_str(&format!("const XMIN: f32 = {};\n", f(g.xmin(0))));
    out.push_str(&format!("const YMIN: f32 = {};\n", f(g.xmin(1))));
    out.push_str(&format!("const ZMIN: f32 = {};\n", f(g.xmin(2))));
    out.push_str(&format!("const XMAX: f32 = {};\n", f(g.xmax(0))));
    out.push_str(&format!("const YMAX: f32 = {};\n", f(g.xmax(1))));
    out.push_str(&format!("const ZMAX: f32 = {};\n", f(g.xmax(2))));
    out.push_str(&format!("const NUM_STATES: u32 = {}u;\n", num_states));
    out.push_str(&format!("const GAMMA: f32 = {};\n", f(config.gamma)));
    out.push_str(&format!(
        "const GRAVITATIONAL_CONSTANT: f32 = {};\n",
        f(config.gravitational_constant)
    ));
    out.push_str("const WORKGROUP_WIDTH: u32 = 64u;\n");
    out
}
