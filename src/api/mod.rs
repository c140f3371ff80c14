use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::core::{
    self, Parameters, Projection, ReturnDistribution, RiskTier, SimulationResult, SolverConfig,
    config,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ForecastPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    monthly_contribution: Option<f64>,
    risk_tier: Option<String>,
    inflation_rate: Option<f64>,
    initial_balance: Option<f64>,
    annual_step_up: Option<f64>,
    employer_contribution: Option<f64>,
    apply_stepup_in_simulation: Option<bool>,
    iterations: Option<u32>,
    seed: Option<u64>,
    target_monthly_payout: Option<f64>,
    use_monte_carlo: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OptimizePayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    target_monthly_payout: Option<f64>,
    target_probability: Option<f64>,
    risk_tier: Option<String>,
    initial_balance: Option<f64>,
    max_contribution: Option<f64>,
    iterations: Option<u32>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ErosionQuery {
    amount: Option<f64>,
    inflation_rate: Option<f64>,
    years: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TierScenario {
    risk_tier: RiskTier,
    projection: Option<Projection>,
    simulation: Option<SimulationResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    method: &'static str,
    scenarios: Vec<TierScenario>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TierAssumption {
    risk_tier: RiskTier,
    returns: ReturnDistribution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssumptionsResponse {
    return_assumptions: Vec<TierAssumption>,
    annuitized_fraction: f64,
    lump_sum_fraction: f64,
    annuity_rate: f64,
    default_inflation_rate: f64,
    min_monthly_contribution: f64,
    default_iterations: u32,
    optimizer_iterations: u32,
    default_seed: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_risk_tier(name: Option<&str>) -> Result<RiskTier, String> {
    match name {
        Some(name) => RiskTier::from_str(name).map_err(|e| e.to_string()),
        None => Ok(RiskTier::Moderate),
    }
}

fn parameters_from_payload(payload: &ForecastPayload) -> Result<Parameters, String> {
    let current_age = payload.current_age.ok_or("currentAge is required")?;
    let retirement_age = payload.retirement_age.ok_or("retirementAge is required")?;
    let monthly_contribution = payload
        .monthly_contribution
        .ok_or("monthlyContribution is required")?;

    let params = Parameters {
        current_age,
        retirement_age,
        monthly_contribution,
        risk_tier: parse_risk_tier(payload.risk_tier.as_deref())?,
        initial_balance: payload.initial_balance.unwrap_or(0.0),
        inflation_rate: payload
            .inflation_rate
            .unwrap_or(config::DEFAULT_INFLATION_RATE),
        annual_step_up: payload.annual_step_up.unwrap_or(0.0),
        employer_contribution: payload.employer_contribution.unwrap_or(0.0),
        apply_stepup_in_simulation: payload.apply_stepup_in_simulation.unwrap_or(false),
        iterations: payload.iterations.unwrap_or(config::DEFAULT_ITERATIONS),
        seed: payload.seed.unwrap_or(config::DEFAULT_SEED),
    };
    params.validate().map_err(|e| e.to_string())?;
    Ok(params)
}

fn optimize_request_from_payload(
    payload: &OptimizePayload,
) -> Result<(Parameters, SolverConfig), String> {
    let current_age = payload.current_age.ok_or("currentAge is required")?;
    let retirement_age = payload.retirement_age.ok_or("retirementAge is required")?;
    let target_monthly_payout = payload
        .target_monthly_payout
        .ok_or("targetMonthlyPayout is required")?;

    // The solver replaces the contribution at every probe; the minimum is
    // only a placeholder that keeps the parameters valid.
    let params = Parameters {
        current_age,
        retirement_age,
        monthly_contribution: config::MIN_MONTHLY_CONTRIBUTION,
        risk_tier: parse_risk_tier(payload.risk_tier.as_deref())?,
        initial_balance: payload.initial_balance.unwrap_or(0.0),
        inflation_rate: config::DEFAULT_INFLATION_RATE,
        annual_step_up: 0.0,
        employer_contribution: 0.0,
        apply_stepup_in_simulation: false,
        iterations: payload.iterations.unwrap_or(config::OPTIMIZER_ITERATIONS),
        seed: payload.seed.unwrap_or(config::DEFAULT_SEED),
    };
    params.validate().map_err(|e| e.to_string())?;

    let mut solver = SolverConfig::new(
        target_monthly_payout,
        payload.target_probability.unwrap_or(70.0),
    );
    if let Some(max_contribution) = payload.max_contribution {
        solver.max_contribution = max_contribution;
    }
    Ok((params, solver))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/goal", get(goal_get_handler).post(goal_post_handler))
        .route(
            "/api/optimize",
            get(optimize_get_handler).post(optimize_post_handler),
        )
        .route(
            "/api/compare",
            get(compare_get_handler).post(compare_post_handler),
        )
        .route(
            "/api/sensitivity",
            get(sensitivity_get_handler).post(sensitivity_post_handler),
        )
        .route("/api/inflation-erosion", get(erosion_handler))
        .route("/api/assumptions", get(assumptions_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("corpus engine API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ForecastPayload>) -> Response {
    project_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ForecastPayload>) -> Response {
    project_impl(payload)
}

fn project_impl(payload: ForecastPayload) -> Response {
    let params = match parameters_from_payload(&payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match core::project(&params) {
        Ok(projection) => json_response(StatusCode::OK, projection),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn simulate_get_handler(Query(payload): Query<ForecastPayload>) -> Response {
    simulate_impl(payload)
}

async fn simulate_post_handler(Json(payload): Json<ForecastPayload>) -> Response {
    simulate_impl(payload)
}

fn simulate_impl(payload: ForecastPayload) -> Response {
    let params = match parameters_from_payload(&payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match core::simulate(&params) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn goal_get_handler(Query(payload): Query<ForecastPayload>) -> Response {
    goal_impl(payload)
}

async fn goal_post_handler(Json(payload): Json<ForecastPayload>) -> Response {
    goal_impl(payload)
}

fn goal_impl(payload: ForecastPayload) -> Response {
    let Some(target_monthly_payout) = payload.target_monthly_payout else {
        return error_response(StatusCode::BAD_REQUEST, "targetMonthlyPayout is required");
    };
    let params = match parameters_from_payload(&payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match core::goal_probability(&params, target_monthly_payout) {
        Ok(goal) => json_response(StatusCode::OK, goal),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn optimize_get_handler(Query(payload): Query<OptimizePayload>) -> Response {
    optimize_impl(payload)
}

async fn optimize_post_handler(Json(payload): Json<OptimizePayload>) -> Response {
    optimize_impl(payload)
}

fn optimize_impl(payload: OptimizePayload) -> Response {
    let (params, solver) = match optimize_request_from_payload(&payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match core::optimize(&params, &solver) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn compare_get_handler(Query(payload): Query<ForecastPayload>) -> Response {
    compare_impl(payload)
}

async fn compare_post_handler(Json(payload): Json<ForecastPayload>) -> Response {
    compare_impl(payload)
}

fn compare_impl(payload: ForecastPayload) -> Response {
    let params = match parameters_from_payload(&payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let use_monte_carlo = payload.use_monte_carlo.unwrap_or(true);

    let mut scenarios = Vec::with_capacity(RiskTier::ALL.len());
    for tier in RiskTier::ALL {
        let tier_params = Parameters {
            risk_tier: tier,
            ..params.clone()
        };
        let scenario = if use_monte_carlo {
            core::simulate(&tier_params).map(|simulation| TierScenario {
                risk_tier: tier,
                projection: None,
                simulation: Some(simulation),
            })
        } else {
            core::project(&tier_params).map(|projection| TierScenario {
                risk_tier: tier,
                projection: Some(projection),
                simulation: None,
            })
        };
        match scenario {
            Ok(scenario) => scenarios.push(scenario),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        }
    }

    json_response(
        StatusCode::OK,
        CompareResponse {
            method: if use_monte_carlo {
                "monte_carlo"
            } else {
                "deterministic"
            },
            scenarios,
        },
    )
}

async fn sensitivity_get_handler(Query(payload): Query<ForecastPayload>) -> Response {
    sensitivity_impl(payload)
}

async fn sensitivity_post_handler(Json(payload): Json<ForecastPayload>) -> Response {
    sensitivity_impl(payload)
}

fn sensitivity_impl(payload: ForecastPayload) -> Response {
    let params = match parameters_from_payload(&payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match core::sensitivity(&params) {
        Ok(report) => json_response(StatusCode::OK, report),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn erosion_handler(Query(query): Query<ErosionQuery>) -> Response {
    let points = core::inflation_erosion(
        query.amount.unwrap_or(100_000.0),
        query
            .inflation_rate
            .unwrap_or(config::DEFAULT_INFLATION_RATE),
        query.years.unwrap_or(30),
    );
    json_response(StatusCode::OK, points)
}

async fn assumptions_handler() -> Response {
    json_response(StatusCode::OK, assumptions_response())
}

fn assumptions_response() -> AssumptionsResponse {
    AssumptionsResponse {
        return_assumptions: RiskTier::ALL
            .into_iter()
            .map(|tier| TierAssumption {
                risk_tier: tier,
                returns: tier.distribution(),
            })
            .collect(),
        annuitized_fraction: config::ANNUITIZED_FRACTION,
        lump_sum_fraction: config::LUMP_SUM_FRACTION,
        annuity_rate: config::ANNUITY_RATE,
        default_inflation_rate: config::DEFAULT_INFLATION_RATE,
        min_monthly_contribution: config::MIN_MONTHLY_CONTRIBUTION,
        default_iterations: config::DEFAULT_ITERATIONS,
        optimizer_iterations: config::OPTIMIZER_ITERATIONS,
        default_seed: config::DEFAULT_SEED,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn parameters_from_json(json: &str) -> Result<Parameters, String> {
    let payload = serde_json::from_str::<ForecastPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    parameters_from_payload(&payload)
}
