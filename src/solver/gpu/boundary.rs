use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::context::GpuContext;
use super::program::{bind_group, encode_dispatch, Program};
use super::structs::BcParams;
use crate::solver::codegen::slots;
use crate::solver::config::{BoundaryMethod, SolverConfig};
use crate::solver::equation::{BoundaryKernelKind, EquationDescriptor};

const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// One ghost-cell update resolved from the configuration: the kernel kind,
/// where it runs and which channel it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedBoundary {
    kind: BoundaryKernelKind,
    axis: usize,
    side: usize,
    chan: u32,
}

/// Per-channel resolution of the configured boundary methods. A method of
/// `None` produces no dispatch; any other method the equation leaves
/// unmapped is a configuration error.
fn resolve_state_boundaries(
    config: &SolverConfig,
    equation: &dyn EquationDescriptor,
) -> Result<Vec<ResolvedBoundary>, String> {
    let dim = config.grid.dim();
    let mut out = Vec::new();
    for axis in 0..dim {
        for side in 0..2 {
            let method = config.boundary_methods[axis][side];
            for chan in 0..equation.num_states(dim) {
                match equation.state_boundary_kernel(method, axis, chan) {
                    Some(kind) => out.push(ResolvedBoundary {
                        kind,
                        axis,
                        side,
                        chan: chan as u32,
                    }),
                    None if method == BoundaryMethod::None => {}
                    None => {
                        return Err(format!(
                            "equation {} maps no boundary kernel for method {} \
                             (axis {axis}, channel {chan})",
                            equation.name(),
                            method.as_str(),
                        ));
                    }
                }
            }
        }
    }
    Ok(out)
}

fn resolve_potential_boundaries(
    config: &SolverConfig,
    equation: &dyn EquationDescriptor,
) -> Result<Vec<ResolvedBoundary>, String> {
    let mut out = Vec::new();
    for axis in 0..config.grid.dim() {
        for side in 0..2 {
            let method = config.boundary_methods[axis][side];
            match equation.gravity_boundary_kernel(method) {
                Some(kind) => out.push(ResolvedBoundary {
                    kind,
                    axis,
                    side,
                    chan: 0,
                }),
                None if method == BoundaryMethod::None => {}
                None => {
                    return Err(format!(
                        "equation {} maps no potential boundary kernel for method {} \
                         (axis {axis})",
                        equation.name(),
                        method.as_str(),
                    ));
                }
            }
        }
    }
    Ok(out)
}

type PipelineTable = HashMap<(BoundaryKernelKind, usize), wgpu::ComputePipeline>;

fn ensure_pipeline(
    pipelines: &mut PipelineTable,
    ctx: &GpuContext,
    program: &Program,
    kind: BoundaryKernelKind,
    axis: usize,
) -> Result<(), String> {
    if let std::collections::hash_map::Entry::Vacant(slot) = pipelines.entry((kind, axis)) {
        let name = format!("boundary_{}_{}", kind.kernel_name(), AXIS_NAMES[axis]);
        slot.insert(program.kernel(ctx, &name)?);
    }
    Ok(())
}

struct BoundaryDispatch {
    pipeline_key: (BoundaryKernelKind, usize),
    bind: wgpu::BindGroup,
    threads: u32,
}

/// Ghost-cell update table. Resolved once at construction: one dispatch
/// record per (axis, side, channel) that maps to a kernel, with its
/// parameter uniform and bind group prebuilt.
pub struct BoundaryTable {
    pipelines: PipelineTable,
    state_entries: Vec<BoundaryDispatch>,
    potential_entries: [Vec<BoundaryDispatch>; 2],
}

impl BoundaryTable {
    pub fn build(
        ctx: &GpuContext,
        program: &Program,
        config: &SolverConfig,
        equation: &dyn EquationDescriptor,
        state: &wgpu::Buffer,
        potential: &[wgpu::Buffer; 2],
    ) -> Result<Self, String> {
        let grid = &config.grid;
        let dim = grid.dim();
        let num_states = equation.num_states(dim) as u32;

        let mut pipelines = PipelineTable::new();

        let mut state_entries = Vec::new();
        for r in resolve_state_boundaries(config, equation)? {
            ensure_pipeline(&mut pipelines, ctx, program, r.kind, r.axis)?;
            let params = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("boundary params"),
                contents: bytemuck::bytes_of(&BcParams {
                    nchan: num_states,
                    chan: r.chan,
                    side: r.side as u32,
                    pad: 0,
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind = bind_group(
                &ctx.device,
                &pipelines[&(r.kind, r.axis)],
                &[(slots::BC_FIELD, state), (slots::BC_PARAMS, &params)],
            );
            state_entries.push(BoundaryDispatch {
                pipeline_key: (r.kind, r.axis),
                bind,
                threads: (grid.volume() / grid.size(r.axis)) as u32,
            });
        }

        let mut potential_entries = [Vec::new(), Vec::new()];
        for r in resolve_potential_boundaries(config, equation)? {
            ensure_pipeline(&mut pipelines, ctx, program, r.kind, r.axis)?;
            for (parity, buf) in potential.iter().enumerate() {
                let params = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("potential boundary params"),
                    contents: bytemuck::bytes_of(&BcParams {
                        nchan: 1,
                        chan: 0,
                        side: r.side as u32,
                        pad: 0,
                    }),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let bind = bind_group(
                    &ctx.device,
                    &pipelines[&(r.kind, r.axis)],
                    &[(slots::BC_FIELD, buf), (slots::BC_PARAMS, &params)],
                );
                potential_entries[parity].push(BoundaryDispatch {
                    pipeline_key: (r.kind, r.axis),
                    bind,
                    threads: (grid.volume() / grid.size(r.axis)) as u32,
                });
            }
        }

        Ok(Self {
            pipelines,
            state_entries,
            potential_entries,
        })
    }

    /// Refreshes the ghost layers of the conserved state field.
    pub fn encode_state(&self, encoder: &mut wgpu::CommandEncoder) {
        for entry in &self.state_entries {
            encode_dispatch(
                encoder,
                &self.pipelines[&entry.pipeline_key],
                &entry.bind,
                entry.threads,
            );
        }
    }

    /// Refreshes the ghost layers of one of the two potential buffers.
    pub fn encode_potential(&self, encoder: &mut wgpu::CommandEncoder, parity: usize) {
        for entry in &self.potential_entries[parity] {
            encode_dispatch(
                encoder,
                &self.pipelines[&entry.pipeline_key],
                &entry.bind,
                entry.threads,
            );
        }
    }
}
