/// Slope limiter applied to the higher-order flux correction.
///
/// The choice is baked into the device program at assembly time, so changing
/// it means rebuilding the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeLimiter {
    DonorCell,
    LaxWendroff,
    BeamWarming,
    VanLeer,
    MinMod,
    #[default]
    Superbee,
}

impl SlopeLimiter {
    pub fn as_str(self) -> &'static str {
        match self {
            SlopeLimiter::DonorCell => "DonorCell",
            SlopeLimiter::LaxWendroff => "LaxWendroff",
            SlopeLimiter::BeamWarming => "BeamWarming",
            SlopeLimiter::VanLeer => "VanLeer",
            SlopeLimiter::MinMod => "MinMod",
            SlopeLimiter::Superbee => "Superbee",
        }
    }

    /// WGSL expression for the limiter function phi(r).
    pub fn wgsl_expr(self) -> &'static str {
        match self {
            SlopeLimiter::DonorCell => "0.0",
            SlopeLimiter::LaxWendroff => "1.0",
            SlopeLimiter::BeamWarming => "r",
            SlopeLimiter::VanLeer => "(r + abs(r)) / (1.0 + abs(r))",
            SlopeLimiter::MinMod => "max(0.0, min(r, 1.0))",
            SlopeLimiter::Superbee => "max(0.0, max(min(1.0, 2.0 * r), min(2.0, r)))",
        }
    }
}

impl std::str::FromStr for SlopeLimiter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DonorCell" => Ok(SlopeLimiter::DonorCell),
            "LaxWendroff" => Ok(SlopeLimiter::LaxWendroff),
            "BeamWarming" => Ok(SlopeLimiter::BeamWarming),
            "VanLeer" => Ok(SlopeLimiter::VanLeer),
            "MinMod" => Ok(SlopeLimiter::MinMod),
            "Superbee" => Ok(SlopeLimiter::Superbee),
            _ => Err(format!("unknown slope limiter: {}", value)),
        }
    }
}
