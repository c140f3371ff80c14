use serde::Serialize;

use super::config;
use super::types::{EngineError, Parameters, Projection, YearRow};

/// Monthly payout produced by mandatorily annuitizing part of a balance at
/// the configured conversion rate.
pub fn monthly_payout(balance: f64) -> f64 {
    balance * config::ANNUITIZED_FRACTION * (config::ANNUITY_RATE / 100.0) / 12.0
}

/// Fixed-rate projection at the tier's point-estimate mean return, with
/// yearly contribution step-up and an employer stream.
pub fn project(params: &Parameters) -> Result<Projection, EngineError> {
    params.validate()?;

    let years = params.years();
    let distribution = params.risk_tier.distribution();
    let monthly_rate = distribution.mean / 100.0 / 12.0;

    let mut balance = params.initial_balance;
    let mut contribution = params.monthly_contribution;
    let mut employer = params.employer_contribution;
    let mut total_employee = 0.0;
    let mut total_employer = 0.0;
    let mut yearly_breakdown = Vec::with_capacity(years as usize);

    for year in 0..years {
        let start_balance = balance;
        let mut year_employee = 0.0;
        let mut year_employer = 0.0;

        for _month in 0..12 {
            balance = balance * (1.0 + monthly_rate) + contribution + employer;
            year_employee += contribution;
            year_employer += employer;
        }

        total_employee += year_employee;
        total_employer += year_employer;

        yearly_breakdown.push(YearRow {
            year: year + 1,
            age: params.current_age + year + 1,
            start_balance,
            end_balance: balance,
            employee_contribution: year_employee,
            employer_contribution: year_employer,
            growth: balance - start_balance - year_employee - year_employer,
            monthly_contribution: contribution,
        });

        // Step-up compounds at year boundaries only, never mid-year.
        if params.annual_step_up > 0.0 {
            contribution *= 1.0 + params.annual_step_up / 100.0;
            employer *= 1.0 + params.annual_step_up / 100.0;
        }
    }

    let total_contributions = total_employee + total_employer;
    let growth_multiplier = if total_contributions > 0.0 {
        balance / total_contributions
    } else {
        0.0
    };

    Ok(Projection {
        risk_tier: params.risk_tier,
        nominal_balance: balance,
        real_balance: deflate(balance, params.inflation_rate, years),
        monthly_payout: monthly_payout(balance),
        total_contributions,
        total_employee_contributions: total_employee,
        total_employer_contributions: total_employer,
        growth_amount: balance - total_contributions - params.initial_balance,
        growth_multiplier,
        expected_return_rate: distribution.mean,
        years,
        lump_sum_withdrawal: balance * config::LUMP_SUM_FRACTION,
        annuity_purchase: balance * config::ANNUITIZED_FRACTION,
        yearly_breakdown,
    })
}

fn deflate(nominal: f64, inflation_rate: f64, years: u32) -> f64 {
    if inflation_rate <= 0.0 || years == 0 {
        return nominal;
    }
    nominal / (1.0 + inflation_rate / 100.0).powi(years as i32)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityRow {
    pub variable: &'static str,
    pub low_value: f64,
    pub base_value: f64,
    pub high_value: f64,
    pub impact_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityReport {
    pub base_balance: f64,
    pub rows: Vec<SensitivityRow>,
}

const MAX_SENSITIVITY_RETIREMENT_AGE: u32 = 75;

/// How much a +/-10% contribution change, a +/-2 year retirement shift and a
/// +/-20% inflation change move the projected outcome.
pub fn sensitivity(params: &Parameters) -> Result<SensitivityReport, EngineError> {
    let base = project(params)?;
    let base_balance = base.nominal_balance;
    let mut rows = Vec::with_capacity(3);

    let high = project(&Parameters {
        monthly_contribution: params.monthly_contribution * 1.1,
        ..params.clone()
    })?
    .nominal_balance;
    let low = project(&Parameters {
        monthly_contribution: params.monthly_contribution * 0.9,
        ..params.clone()
    })?
    .nominal_balance;
    rows.push(SensitivityRow {
        variable: "monthly_contribution",
        low_value: low,
        base_value: base_balance,
        high_value: high,
        impact_pct: (high - low) / base_balance * 100.0,
    });

    let high = if params.retirement_age + 2 <= MAX_SENSITIVITY_RETIREMENT_AGE {
        project(&Parameters {
            retirement_age: params.retirement_age + 2,
            ..params.clone()
        })?
        .nominal_balance
    } else {
        base_balance
    };
    let low = project(&Parameters {
        retirement_age: (params.current_age + 1).max(params.retirement_age.saturating_sub(2)),
        ..params.clone()
    })?
    .nominal_balance;
    rows.push(SensitivityRow {
        variable: "retirement_age",
        low_value: low,
        base_value: base_balance,
        high_value: high,
        impact_pct: (high - low) / base_balance * 100.0,
    });

    // Higher inflation means a lower real balance, so the bounds swap.
    let high_inflation = project(&Parameters {
        inflation_rate: params.inflation_rate * 1.2,
        ..params.clone()
    })?
    .real_balance;
    let low_inflation = project(&Parameters {
        inflation_rate: params.inflation_rate * 0.8,
        ..params.clone()
    })?
    .real_balance;
    let base_real = base.real_balance;
    rows.push(SensitivityRow {
        variable: "inflation_rate",
        low_value: high_inflation,
        base_value: base_real,
        high_value: low_inflation,
        impact_pct: (low_inflation - high_inflation) / base_real * 100.0,
    });

    Ok(SensitivityReport {
        base_balance,
        rows,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErosionPoint {
    pub year: u32,
    pub nominal: f64,
    pub real_value: f64,
    pub purchasing_power_pct: f64,
}

/// Purchasing-power decay of a fixed amount, sampled at roughly ten points
/// across the horizon.
pub fn inflation_erosion(amount: f64, inflation_rate: f64, years: u32) -> Vec<ErosionPoint> {
    let step = (years / 10).max(1) as usize;
    (0..=years)
        .step_by(step)
        .map(|year| {
            let real_value = deflate(amount, inflation_rate, year);
            ErosionPoint {
                year,
                nominal: amount,
                real_value,
                purchasing_power_pct: if amount > 0.0 {
                    real_value / amount * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}
