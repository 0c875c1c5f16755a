pub mod codegen;
pub mod config;
pub mod equation;
pub mod gpu;
pub mod grid;
pub mod limiter;
pub mod scheme;

pub use config::{BoundaryMethod, FluxFlagPolicy, InitialCell, IntegratorKind, SolverConfig};
pub use equation::BoundaryKernelKind;
pub use gpu::solver::Solver;
pub use grid::Grid;
pub use limiter::SlopeLimiter;
pub use scheme::SchemeKind;
