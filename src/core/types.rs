use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use super::config;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("retirement age ({retirement_age}) must be greater than current age ({current_age})")]
    InvalidRange {
        current_age: u32,
        retirement_age: u32,
    },
    #[error("unknown risk tier: {0}")]
    UnknownRiskTier(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [
        RiskTier::Conservative,
        RiskTier::Moderate,
        RiskTier::Aggressive,
    ];

    pub fn distribution(self) -> ReturnDistribution {
        match self {
            RiskTier::Conservative => config::CONSERVATIVE_RETURNS,
            RiskTier::Moderate => config::MODERATE_RETURNS,
            RiskTier::Aggressive => config::AGGRESSIVE_RETURNS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Conservative => "conservative",
            RiskTier::Moderate => "moderate",
            RiskTier::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(RiskTier::Conservative),
            "moderate" => Ok(RiskTier::Moderate),
            "aggressive" => Ok(RiskTier::Aggressive),
            other => Err(EngineError::UnknownRiskTier(other.to_string())),
        }
    }
}

/// Annual return distribution in percent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone)]
pub struct Parameters {
    pub current_age: u32,
    pub retirement_age: u32,
    /// Monthly employee contribution.
    pub monthly_contribution: f64,
    pub risk_tier: RiskTier,
    pub initial_balance: f64,
    /// Expected annual inflation in percent; only the deterministic
    /// projection deflates by it.
    pub inflation_rate: f64,
    /// Annual growth of both contribution streams in percent, applied once
    /// per year boundary.
    pub annual_step_up: f64,
    /// Monthly employer contribution; ignored by the stochastic simulator.
    pub employer_contribution: f64,
    /// The stochastic simulator holds the contribution fixed unless this is
    /// set; the deterministic projector always steps up.
    pub apply_stepup_in_simulation: bool,
    pub iterations: u32,
    pub seed: u64,
}

impl Parameters {
    pub fn years(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn months(&self) -> u32 {
        self.years() * 12
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.retirement_age <= self.current_age {
            return Err(EngineError::InvalidRange {
                current_age: self.current_age,
                retirement_age: self.retirement_age,
            });
        }
        if !self.monthly_contribution.is_finite() || self.monthly_contribution <= 0.0 {
            return Err(EngineError::InvalidParameter(
                "monthly contribution must be > 0".to_string(),
            ));
        }
        if !self.initial_balance.is_finite() || self.initial_balance < 0.0 {
            return Err(EngineError::InvalidParameter(
                "initial balance must be >= 0".to_string(),
            ));
        }
        if !self.inflation_rate.is_finite() || self.inflation_rate < 0.0 {
            return Err(EngineError::InvalidParameter(
                "inflation rate must be >= 0".to_string(),
            ));
        }
        if !self.annual_step_up.is_finite() || self.annual_step_up < 0.0 {
            return Err(EngineError::InvalidParameter(
                "annual step-up must be >= 0".to_string(),
            ));
        }
        if !self.employer_contribution.is_finite() || self.employer_contribution < 0.0 {
            return Err(EngineError::InvalidParameter(
                "employer contribution must be >= 0".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(EngineError::InvalidParameter(
                "iterations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub year: u32,
    pub age: u32,
    pub start_balance: f64,
    pub end_balance: f64,
    pub employee_contribution: f64,
    pub employer_contribution: f64,
    pub growth: f64,
    pub monthly_contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub risk_tier: RiskTier,
    pub nominal_balance: f64,
    pub real_balance: f64,
    pub monthly_payout: f64,
    pub total_contributions: f64,
    pub total_employee_contributions: f64,
    pub total_employer_contributions: f64,
    pub growth_amount: f64,
    pub growth_multiplier: f64,
    pub expected_return_rate: f64,
    pub years: u32,
    pub lump_sum_withdrawal: f64,
    pub annuity_purchase: f64,
    pub yearly_breakdown: Vec<YearRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceStatistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_10: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_90: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutStatistics {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_10: f64,
    pub percentile_90: f64,
}

/// Percentile trajectories across all trials, indexed by year; index 0 is
/// the starting balance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyBands {
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub bin_edges: Vec<f64>,
    pub frequencies: Vec<u32>,
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub risk_tier: RiskTier,
    pub iterations: u32,
    pub balance_statistics: BalanceStatistics,
    pub payout_statistics: PayoutStatistics,
    pub yearly_bands: YearlyBands,
    pub histogram: Histogram,
    pub final_balances: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProbability {
    pub target_monthly_payout: f64,
    pub required_balance: f64,
    /// Fraction of trials whose final balance meets the requirement, in
    /// percent.
    pub probability: f64,
    pub median_balance: f64,
    pub balance_gap: f64,
    pub additional_monthly_contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub required_contribution: f64,
    pub achieved_probability: f64,
    pub target_probability: f64,
    pub target_monthly_payout: f64,
    pub required_balance: f64,
    pub deterministic_baseline: f64,
    pub risk_adjusted_multiplier: f64,
    pub is_achievable: bool,
    pub probes: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_parameters() -> Parameters {
        Parameters {
            current_age: 30,
            retirement_age: 60,
            monthly_contribution: 5_000.0,
            risk_tier: RiskTier::Moderate,
            initial_balance: 0.0,
            inflation_rate: 6.0,
            annual_step_up: 0.0,
            employer_contribution: 0.0,
            apply_stepup_in_simulation: false,
            iterations: 1_000,
            seed: 42,
        }
    }

    #[test]
    fn valid_parameters_pass_validation() {
        assert_eq!(sample_parameters().validate(), Ok(()));
        assert_eq!(sample_parameters().years(), 30);
        assert_eq!(sample_parameters().months(), 360);
    }

    #[test]
    fn equal_ages_are_an_invalid_range() {
        let mut params = sample_parameters();
        params.retirement_age = params.current_age;
        assert_eq!(
            params.validate(),
            Err(EngineError::InvalidRange {
                current_age: 30,
                retirement_age: 30,
            })
        );
    }

    #[test]
    fn inverted_ages_are_an_invalid_range() {
        let mut params = sample_parameters();
        params.retirement_age = 25;
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn non_positive_contribution_is_rejected() {
        let mut params = sample_parameters();
        params.monthly_contribution = 0.0;
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidParameter(_))
        ));

        params.monthly_contribution = f64::NAN;
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn negative_balance_is_rejected() {
        let mut params = sample_parameters();
        params.initial_balance = -1.0;
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn zero_iterations_are_rejected() {
        let mut params = sample_parameters();
        params.iterations = 0;
        assert!(matches!(
            params.validate(),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn risk_tier_parses_known_names() {
        assert_eq!("conservative".parse(), Ok(RiskTier::Conservative));
        assert_eq!("moderate".parse(), Ok(RiskTier::Moderate));
        assert_eq!("aggressive".parse(), Ok(RiskTier::Aggressive));
    }

    #[test]
    fn risk_tier_rejects_unknown_names() {
        let err = "balanced".parse::<RiskTier>().expect_err("must reject");
        assert_eq!(err, EngineError::UnknownRiskTier("balanced".to_string()));
        assert_eq!(err.to_string(), "unknown risk tier: balanced");
    }

    #[test]
    fn tiers_map_to_configured_distributions() {
        let conservative = RiskTier::Conservative.distribution();
        let moderate = RiskTier::Moderate.distribution();
        let aggressive = RiskTier::Aggressive.distribution();

        assert_eq!(conservative.mean, 9.0);
        assert_eq!(conservative.std_dev, 5.0);
        assert_eq!(moderate.mean, 11.0);
        assert_eq!(moderate.std_dev, 8.0);
        assert_eq!(aggressive.mean, 13.0);
        assert_eq!(aggressive.std_dev, 12.0);

        assert!(conservative.mean < moderate.mean && moderate.mean < aggressive.mean);
        assert!(conservative.std_dev < moderate.std_dev && moderate.std_dev < aggressive.std_dev);
    }

    #[test]
    fn risk_tier_display_round_trips() {
        for tier in RiskTier::ALL {
            assert_eq!(tier.to_string().parse::<RiskTier>(), Ok(tier));
        }
    }
}
