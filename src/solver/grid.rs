/// Immutable per-run grid description.
///
/// Cell counts include the two ghost layers on each side of every active
/// axis. Collapsed axes have size 1 and take no part in boundary dispatch
/// or flux evaluation. Iteration order is row-major with the x axis
/// innermost, so `step(0) == 1` and each later axis strides by the product
/// of the earlier sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    dim: usize,
    size: [usize; 3],
    xmin: [f32; 3],
    xmax: [f32; 3],
}

impl Grid {
    pub fn new(dim: usize, size: [usize; 3], xmin: [f32; 3], xmax: [f32; 3]) -> Result<Self, String> {
        if !(1..=3).contains(&dim) {
            return Err(format!("grid dimension must be 1..3, got {}", dim));
        }
        let mut size = size;
        for d in dim..3 {
            size[d] = 1;
        }
        for d in 0..dim {
            // two ghost layers per side plus at least one interior cell
            if size[d] < 5 {
                return Err(format!(
                    "grid axis {} needs at least 5 cells (got {})",
                    d, size[d]
                ));
            }
            if !(xmax[d] > xmin[d]) {
                return Err(format!(
                    "grid axis {} has empty domain [{}, {}]",
                    d, xmin[d], xmax[d]
                ));
            }
        }
        Ok(Self { dim, size, xmin, xmax })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn size(&self, d: usize) -> usize {
        self.size[d]
    }

    /// Total cell count, ghost layers included.
    pub fn volume(&self) -> usize {
        self.size[0] * self.size[1] * self.size[2]
    }

    /// Linear stride of axis `d` in the row-major cell ordering.
    pub fn step(&self, d: usize) -> usize {
        match d {
            0 => 1,
            1 => self.size[0],
            _ => self.size[0] * self.size[1],
        }
    }

    pub fn xmin(&self, d: usize) -> f32 {
        self.xmin[d]
    }

    pub fn xmax(&self, d: usize) -> f32 {
        self.xmax[d]
    }

    /// Cell spacing along axis `d`. Collapsed axes report spacing 1.
    pub fn dx(&self, d: usize) -> f32 {
        if d >= self.dim {
            return 1.0;
        }
        (self.xmax[d] - self.xmin[d]) / self.size[d] as f32
    }

    /// Center position of the cell with per-axis indices `idx`.
    pub fn cell_center(&self, idx: [usize; 3]) -> [f32; 3] {
        let mut pos = [0.0f32; 3];
        for d in 0..3 {
            if d < self.dim {
                pos[d] = self.xmin[d]
                    + (self.xmax[d] - self.xmin[d]) * (idx[d] as f32 + 0.5) / self.size[d] as f32;
            }
        }
        pos
    }
}
