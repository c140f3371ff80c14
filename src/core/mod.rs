pub mod config;

mod goal;
mod projector;
mod simulator;
mod solver;
mod types;

pub use goal::{evaluate_goal, goal_probability, required_balance};
pub use projector::{
    ErosionPoint, SensitivityReport, SensitivityRow, inflation_erosion, monthly_payout, project,
    sensitivity,
};
pub use simulator::simulate;
pub use solver::{SolverConfig, optimize};
pub use types::{
    BalanceStatistics, EngineError, GoalProbability, Histogram, OptimizationResult, Parameters,
    PayoutStatistics, Projection, ReturnDistribution, RiskTier, SimulationResult, YearRow,
    YearlyBands,
};
