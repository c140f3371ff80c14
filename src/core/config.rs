use super::types::ReturnDistribution;

/// Annual return assumptions per risk tier, in percent.
pub const CONSERVATIVE_RETURNS: ReturnDistribution = ReturnDistribution {
    mean: 9.0,
    std_dev: 5.0,
};
pub const MODERATE_RETURNS: ReturnDistribution = ReturnDistribution {
    mean: 11.0,
    std_dev: 8.0,
};
pub const AGGRESSIVE_RETURNS: ReturnDistribution = ReturnDistribution {
    mean: 13.0,
    std_dev: 12.0,
};

/// Share of the final balance that must be converted into an annuity at
/// retirement; the remainder is available as a lump sum.
pub const ANNUITIZED_FRACTION: f64 = 0.40;
pub const LUMP_SUM_FRACTION: f64 = 0.60;

/// Annual conversion rate applied to the annuitized portion, in percent.
pub const ANNUITY_RATE: f64 = 6.5;

pub const DEFAULT_INFLATION_RATE: f64 = 6.0;

/// Smallest monthly contribution the scheme accepts.
pub const MIN_MONTHLY_CONTRIBUTION: f64 = 500.0;

pub const DEFAULT_ITERATIONS: u32 = 10_000;
pub const DEFAULT_SEED: u64 = 42;

/// Iterations used for each optimizer probe; lower than the default so a
/// 20-probe search stays affordable.
pub const OPTIMIZER_ITERATIONS: u32 = 5_000;
pub const DEFAULT_MAX_CONTRIBUTION: f64 = 100_000.0;
pub const CONTRIBUTION_TOLERANCE: f64 = 100.0;
pub const MAX_PROBES: u32 = 20;

pub const HISTOGRAM_BINS: usize = 50;
