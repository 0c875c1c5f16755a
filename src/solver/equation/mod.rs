mod euler;
mod mhd;

pub use euler::Euler;
pub use mhd::Mhd;

use crate::solver::config::{BoundaryMethod, InitialCell};
use crate::solver::grid::Grid;

/// Concrete boundary kernel selected for one (method, axis, channel)
/// combination. One precompiled kernel exists per kind and active axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryKernelKind {
    Periodic,
    Mirror,
    Reflect,
    FreeFlow,
}

impl BoundaryKernelKind {
    /// WGSL entry point name component.
    pub fn kernel_name(self) -> &'static str {
        match self {
            BoundaryKernelKind::Periodic => "periodic",
            BoundaryKernelKind::Mirror => "mirror",
            BoundaryKernelKind::Reflect => "reflect",
            BoundaryKernelKind::FreeFlow => "freeflow",
        }
    }
}

/// Per-equation description consumed by the solver: state channel layout,
/// device source fragments, and the boundary-method-to-kernel resolution
/// functions.
///
/// Distinct state channels may resolve differently: a momentum component
/// normal to a mirror boundary reflects sign while tangential components
/// merely mirror.
pub trait EquationDescriptor {
    fn name(&self) -> &'static str;

    fn num_states(&self, dim: usize) -> usize;

    fn channel_names(&self, dim: usize) -> Vec<&'static str>;

    /// Resolve the boundary kernel for one state channel. `None` means no
    /// kernel runs for that axis/side.
    fn state_boundary_kernel(
        &self,
        method: BoundaryMethod,
        axis: usize,
        channel: usize,
    ) -> Option<BoundaryKernelKind>;

    /// Resolve the boundary kernel for the gravitational potential field.
    fn gravity_boundary_kernel(&self, method: BoundaryMethod) -> Option<BoundaryKernelKind>;

    /// Equation-specific WGSL fragments, appended after the shared utility
    /// code in the assembled program.
    fn source_fragments(&self, grid: &Grid) -> Vec<String>;

    /// Pack one raw initial-condition record into `out` (length
    /// `num_states(dim)`) in this equation's channel order.
    fn pack_initial(&self, dim: usize, cell: &InitialCell, out: &mut [f32]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_mirror_reflects_normal_momentum_only() {
        let eq = Euler;
        for dim in 0..3 {
            let normal = 1 + dim;
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Mirror, dim, normal),
                Some(BoundaryKernelKind::Reflect)
            );
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Mirror, dim, 0),
                Some(BoundaryKernelKind::Mirror)
            );
            // tangential momentum
            let tangential = 1 + (dim + 1) % 3;
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Mirror, dim, tangential),
                Some(BoundaryKernelKind::Mirror)
            );
        }
    }

    #[test]
    fn euler_direct_mappings() {
        let eq = Euler;
        for channel in 0..4 {
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Periodic, 0, channel),
                Some(BoundaryKernelKind::Periodic)
            );
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::FreeFlow, 0, channel),
                Some(BoundaryKernelKind::FreeFlow)
            );
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::None, 0, channel),
                None
            );
        }
    }

    #[test]
    fn gravity_mirror_resolves_to_freeflow() {
        let eq = Euler;
        assert_eq!(
            eq.gravity_boundary_kernel(BoundaryMethod::Mirror),
            Some(BoundaryKernelKind::FreeFlow)
        );
        assert_eq!(
            eq.gravity_boundary_kernel(BoundaryMethod::Periodic),
            Some(BoundaryKernelKind::Periodic)
        );
        assert_eq!(eq.gravity_boundary_kernel(BoundaryMethod::None), None);
    }

    #[test]
    fn mhd_mirror_reflects_normal_momentum_and_field() {
        let eq = Mhd;
        for dim in 0..3 {
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Mirror, dim, 1 + dim),
                Some(BoundaryKernelKind::Reflect)
            );
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Mirror, dim, 4 + dim),
                Some(BoundaryKernelKind::Reflect)
            );
            assert_eq!(
                eq.state_boundary_kernel(BoundaryMethod::Mirror, dim, 7),
                Some(BoundaryKernelKind::Mirror)
            );
        }
    }

    #[test]
    fn state_counts() {
        assert_eq!(Euler.num_states(1), 3);
        assert_eq!(Euler.num_states(2), 4);
        assert_eq!(Euler.num_states(3), 5);
        assert_eq!(Mhd.num_states(1), 8);
        assert_eq!(Mhd.num_states(3), 8);
    }

    #[test]
    fn initial_packing_follows_channel_order() {
        let cell = InitialCell {
            density: 1.0,
            momentum: [2.0, 3.0, 4.0],
            magnetic: [5.0, 6.0, 7.0],
            energy_total: 8.0,
        };
        let mut out = [0.0f32; 4];
        Euler.pack_initial(2, &cell, &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 8.0]);

        let mut out = [0.0f32; 8];
        Mhd.pack_initial(1, &cell, &mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }
}
