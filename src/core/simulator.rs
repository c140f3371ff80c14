use std::f64::consts::PI;

use rayon::prelude::*;

use super::config;
use super::projector::monthly_payout;
use super::types::{
    BalanceStatistics, EngineError, Histogram, Parameters, PayoutStatistics, ReturnDistribution,
    SimulationResult, YearlyBands,
};

// Sampled annual returns are clamped so the geometric monthly conversion
// stays defined even for deep-loss draws.
const MIN_ANNUAL_RETURN: f64 = -95.0;
const MAX_ANNUAL_RETURN: f64 = 250.0;

/// Monte Carlo projection: N independent trials, one annual return draw per
/// year, deterministic for a fixed seed regardless of how trials are
/// scheduled.
pub fn simulate(params: &Parameters) -> Result<SimulationResult, EngineError> {
    simulate_with(params, params.risk_tier.distribution())
}

pub(crate) fn simulate_with(
    params: &Parameters,
    distribution: ReturnDistribution,
) -> Result<SimulationResult, EngineError> {
    params.validate()?;

    let years = params.years() as usize;
    let paths: Vec<Vec<f64>> = (0..params.iterations)
        .into_par_iter()
        .map(|trial| {
            let mut rng = Rng::new(derive_seed(params.seed, trial));
            run_trial(params, distribution, years, &mut rng)
        })
        .collect();

    let final_balances: Vec<f64> = paths.iter().map(|path| path[years]).collect();
    let payouts: Vec<f64> = final_balances.iter().map(|&b| monthly_payout(b)).collect();

    Ok(SimulationResult {
        risk_tier: params.risk_tier,
        iterations: params.iterations,
        balance_statistics: balance_statistics(&final_balances),
        payout_statistics: payout_statistics(&payouts),
        yearly_bands: yearly_bands(&paths, years),
        histogram: build_histogram(&final_balances, params.iterations),
        final_balances,
    })
}

fn run_trial(
    params: &Parameters,
    distribution: ReturnDistribution,
    years: usize,
    rng: &mut Rng,
) -> Vec<f64> {
    let mut path = Vec::with_capacity(years + 1);
    let mut balance = params.initial_balance;
    let mut contribution = params.monthly_contribution;
    path.push(balance);

    for _year in 0..years {
        let annual_return = sample_annual_return(distribution, rng);
        let monthly_rate = (1.0 + annual_return / 100.0).powf(1.0 / 12.0) - 1.0;

        for _month in 0..12 {
            balance = (balance * (1.0 + monthly_rate) + contribution).max(0.0);
        }
        path.push(balance);

        if params.apply_stepup_in_simulation && params.annual_step_up > 0.0 {
            contribution *= 1.0 + params.annual_step_up / 100.0;
        }
    }

    path
}

fn sample_annual_return(distribution: ReturnDistribution, rng: &mut Rng) -> f64 {
    (distribution.mean + distribution.std_dev * rng.standard_normal())
        .clamp(MIN_ANNUAL_RETURN, MAX_ANNUAL_RETURN)
}

fn balance_statistics(values: &[f64]) -> BalanceStatistics {
    let mut sorted = values.to_vec();
    BalanceStatistics {
        mean: mean(values),
        median: percentile(&mut sorted, 50.0),
        std_dev: std_dev(values),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        percentile_10: percentile(&mut sorted, 10.0),
        percentile_25: percentile(&mut sorted, 25.0),
        percentile_75: percentile(&mut sorted, 75.0),
        percentile_90: percentile(&mut sorted, 90.0),
    }
}

fn payout_statistics(values: &[f64]) -> PayoutStatistics {
    let mut sorted = values.to_vec();
    PayoutStatistics {
        mean: mean(values),
        median: percentile(&mut sorted, 50.0),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        percentile_10: percentile(&mut sorted, 10.0),
        percentile_90: percentile(&mut sorted, 90.0),
    }
}

fn yearly_bands(paths: &[Vec<f64>], years: usize) -> YearlyBands {
    let mut p10 = Vec::with_capacity(years + 1);
    let mut p50 = Vec::with_capacity(years + 1);
    let mut p90 = Vec::with_capacity(years + 1);

    for year in 0..=years {
        let mut column: Vec<f64> = paths.iter().map(|path| path[year]).collect();
        p10.push(percentile(&mut column, 10.0));
        p50.push(percentile(&mut column, 50.0));
        p90.push(percentile(&mut column, 90.0));
    }

    YearlyBands { p10, p50, p90 }
}

fn build_histogram(values: &[f64], iterations: u32) -> Histogram {
    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max > min) {
        // All outcomes identical (e.g. zero volatility); widen the range so
        // every value lands in a real bin.
        min -= 0.5;
        max += 0.5;
    }

    let bins = config::HISTOGRAM_BINS;
    let width = (max - min) / bins as f64;
    let bin_edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();

    let mut frequencies = vec![0u32; bins];
    for &value in values {
        let index = (((value - min) / width) as usize).min(bins - 1);
        frequencies[index] += 1;
    }

    let probabilities = frequencies
        .iter()
        .map(|&count| count as f64 / iterations as f64 * 100.0)
        .collect();

    Histogram {
        bin_edges,
        frequencies,
        probabilities,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let mu = mean(values);
    let variance = values
        .iter()
        .map(|value| {
            let delta = value - mu;
            delta * delta
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

fn derive_seed(base_seed: u64, trial: u32) -> u64 {
    splitmix64(base_seed ^ ((trial as u64) << 32) ^ trial as u64)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
