pub mod boundary;
pub mod buffers;
pub mod context;
pub mod gravity;
pub mod integrate;
pub mod program;
pub mod readback;
pub mod reduce;
pub mod solver;
pub mod structs;

pub use context::GpuContext;
pub use solver::Solver;
