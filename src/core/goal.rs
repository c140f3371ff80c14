use super::config;
use super::simulator::simulate;
use super::types::{EngineError, GoalProbability, Parameters, SimulationResult};

/// Balance needed so the mandatory annuitized slice funds the target
/// monthly payout.
pub fn required_balance(target_monthly_payout: f64) -> f64 {
    target_monthly_payout * 12.0 / (config::ANNUITIZED_FRACTION * config::ANNUITY_RATE / 100.0)
}

/// Future value of one currency unit contributed monthly for `months` at
/// `monthly_rate`; degenerates to plain accumulation at zero rate.
pub(crate) fn annuity_factor(monthly_rate: f64, months: u32) -> f64 {
    if monthly_rate == 0.0 {
        months as f64
    } else {
        ((1.0 + monthly_rate).powi(months as i32) - 1.0) / monthly_rate * (1.0 + monthly_rate)
    }
}

/// Success probability of a target payout against a completed simulation
/// run, with a rough estimate of the extra monthly contribution needed to
/// close any gap to the median outcome.
pub fn evaluate_goal(
    params: &Parameters,
    target_monthly_payout: f64,
    result: &SimulationResult,
) -> Result<GoalProbability, EngineError> {
    if !target_monthly_payout.is_finite() || target_monthly_payout <= 0.0 {
        return Err(EngineError::InvalidParameter(
            "target monthly payout must be > 0".to_string(),
        ));
    }

    let required = required_balance(target_monthly_payout);
    let trials = result.final_balances.len();
    let successes = result
        .final_balances
        .iter()
        .filter(|&&balance| balance >= required)
        .count();
    let probability = successes as f64 / trials as f64 * 100.0;

    let median_balance = result.balance_statistics.median;
    let balance_gap = required - median_balance;
    let additional_monthly_contribution = if balance_gap > 0.0 {
        let monthly_rate = params.risk_tier.distribution().mean / 100.0 / 12.0;
        (balance_gap / annuity_factor(monthly_rate, params.months())).max(0.0)
    } else {
        0.0
    };

    Ok(GoalProbability {
        target_monthly_payout,
        required_balance: required,
        probability,
        median_balance,
        balance_gap,
        additional_monthly_contribution,
    })
}

/// Runs a fresh simulation and evaluates the goal against it; the
/// optimizer's probe path.
pub fn goal_probability(
    params: &Parameters,
    target_monthly_payout: f64,
) -> Result<GoalProbability, EngineError> {
    let result = simulate(params)?;
    evaluate_goal(params, target_monthly_payout, &result)
}
