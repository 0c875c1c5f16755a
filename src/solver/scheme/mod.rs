mod burgers;
mod hll;
mod mhd_roe;
mod roe;

use std::str::FromStr;

pub use burgers::Burgers;
pub use hll::EulerHll;
pub use mhd_roe::MhdRoe;
pub use roe::EulerRoe;

use crate::solver::config::SolverConfig;
use crate::solver::equation::{Euler, EquationDescriptor, Mhd};
use crate::solver::gpu::buffers::BufferArena;
use crate::solver::gpu::context::GpuContext;
use crate::solver::gpu::program::Program;

/// Flux scheme selection. Fixed for the lifetime of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemeKind {
    Burgers,
    EulerHll,
    #[default]
    EulerRoe,
    MhdRoe,
}

impl SchemeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeKind::Burgers => "Burgers",
            SchemeKind::EulerHll => "EulerHLL",
            SchemeKind::EulerRoe => "EulerRoe",
            SchemeKind::MhdRoe => "MHDRoe",
        }
    }

    pub fn equation(&self) -> Box<dyn EquationDescriptor> {
        match self {
            SchemeKind::MhdRoe => Box::new(Mhd),
            _ => Box::new(Euler),
        }
    }

    /// WGSL fragments appended after the equation fragments.
    pub fn program_sources(&self, config: &SolverConfig) -> Vec<String> {
        match self {
            SchemeKind::Burgers => burgers::sources(),
            SchemeKind::EulerHll => hll::sources(),
            SchemeKind::EulerRoe => roe::sources(config),
            SchemeKind::MhdRoe => mhd_roe::sources(config),
        }
    }

    /// Instantiates the scheme's pipelines, auxiliary buffers and prebuilt
    /// bind groups against an already built program.
    pub fn build(
        &self,
        res: &SchemeResources,
        arena: &mut BufferArena,
        config: &SolverConfig,
    ) -> Result<Box<dyn FluxScheme>, String> {
        Ok(match self {
            SchemeKind::Burgers => Box::new(Burgers::new(res, arena)?),
            SchemeKind::EulerHll => Box::new(EulerHll::new(res)?),
            SchemeKind::EulerRoe => Box::new(EulerRoe::new(res, arena)?),
            SchemeKind::MhdRoe => Box::new(MhdRoe::new(res, arena, config)?),
        })
    }
}

impl FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "burgers" => Ok(SchemeKind::Burgers),
            "eulerhll" | "hll" => Ok(SchemeKind::EulerHll),
            "eulerroe" | "roe" => Ok(SchemeKind::EulerRoe),
            "mhdroe" => Ok(SchemeKind::MhdRoe),
            other => Err(format!("failed to find scheme named {other}")),
        }
    }
}

/// Shared handles a scheme needs to build its pipelines and bind groups.
pub struct SchemeResources<'a> {
    pub ctx: &'a GpuContext,
    pub program: &'a Program,
    pub state: &'a wgpu::Buffer,
    pub step_params: &'a wgpu::Buffer,
    pub cfl_metric: &'a wgpu::Buffer,
    pub flux: &'a wgpu::Buffer,
    pub volume: u32,
    pub dim: u32,
    pub num_states: u32,
}

/// One member per flux scheme; chosen once at solver construction. Schemes
/// record the compute passes for the timestep metric and the flux part of
/// the derivative.
pub trait FluxScheme {
    fn kind(&self) -> SchemeKind;

    /// Per-step preparation, recorded before the timestep metric. Default:
    /// nothing.
    fn begin_step(&self, _ctx: &GpuContext, _encoder: &mut wgpu::CommandEncoder) {}

    /// Writes the per-cell CFL metric for the current state.
    fn encode_timestep_metric(&self, encoder: &mut wgpu::CommandEncoder);

    /// Writes the flux-divergence derivative of the current state contents
    /// into `deriv`. Ghost cells must already be current.
    fn encode_derivative(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        state: &wgpu::Buffer,
        flux: &wgpu::Buffer,
        deriv: &wgpu::Buffer,
    );

    /// Per-face diagnostic flag buffer, if the scheme keeps one.
    fn flux_flag(&self) -> Option<&wgpu::Buffer> {
        None
    }
}
