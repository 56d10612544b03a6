//! Mean-variance optimization.
//!
//! Each mode is expressed as a `ConstrainedProblem` over long-only, fully
//! invested weights and handed to a `Solver`:
//! - `MaxSharpe`: minimize −Sharpe
//! - `MinVolatility`: minimize σ
//! - `TargetReturn`: minimize σ subject to w·μ = target
//!
//! An unconverged or invalid result is never returned; callers get
//! `EngineError::OptimizationFailed` instead.

pub mod objective;
pub mod problem;
mod projection;
pub mod solver;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use objective::{NegativeSharpeObjective, VolatilityObjective};
pub use problem::{Bounds, ConstrainedProblem, Constraint, Objective};
pub use solver::{ProjectedLagrangianSolver, Solution, Solver, SolverConfig, SolverError};

use crate::error::{EngineError, Result};
use crate::portfolio::{equal_weights, evaluate, PortfolioStatistics};
use crate::stats::AnnualizedStatistics;

/// Tolerance on the final weight invariants.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationMode {
    MaxSharpe,
    MinVolatility,
    TargetReturn { target: f64 },
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationMode::MaxSharpe => write!(f, "max_sharpe"),
            OptimizationMode::MinVolatility => write!(f, "min_volatility"),
            OptimizationMode::TargetReturn { target } => write!(f, "target_return({target:.4})"),
        }
    }
}

/// Weights and statistics for one solved mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedPortfolio {
    pub mode: OptimizationMode,
    pub symbols: Vec<String>,
    pub weights: Vec<f64>,
    pub statistics: PortfolioStatistics,
    pub iterations: usize,
}

impl OptimizedPortfolio {
    pub fn weight_of(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.weights[i])
    }

    /// `(symbol, weight)` pairs in asset order.
    pub fn allocation(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.symbols
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }
}

/// Solves optimization modes for one set of annualized statistics.
pub struct Optimizer<'a, S = ProjectedLagrangianSolver> {
    stats: &'a AnnualizedStatistics,
    risk_free_rate: f64,
    solver: S,
}

impl<'a> Optimizer<'a> {
    /// Optimizer with the default projected Lagrangian solver.
    pub fn new(stats: &'a AnnualizedStatistics, risk_free_rate: f64) -> Self {
        Self::with_solver(stats, risk_free_rate, ProjectedLagrangianSolver::default())
    }
}

impl<'a, S: Solver> Optimizer<'a, S> {
    pub fn with_solver(stats: &'a AnnualizedStatistics, risk_free_rate: f64, solver: S) -> Self {
        Self {
            stats,
            risk_free_rate,
            solver,
        }
    }

    pub fn statistics(&self) -> &'a AnnualizedStatistics {
        self.stats
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn max_sharpe(&self) -> Result<OptimizedPortfolio> {
        self.optimize(OptimizationMode::MaxSharpe)
    }

    pub fn min_volatility(&self) -> Result<OptimizedPortfolio> {
        self.optimize(OptimizationMode::MinVolatility)
    }

    pub fn target_return(&self, target: f64) -> Result<OptimizedPortfolio> {
        self.optimize(OptimizationMode::TargetReturn { target })
    }

    pub fn optimize(&self, mode: OptimizationMode) -> Result<OptimizedPortfolio> {
        let n = self.stats.n_assets();
        if n == 0 {
            return Err(EngineError::insufficient("optimizer assets", 1, 0));
        }
        let mean = &self.stats.mean;
        let cov = &self.stats.covariance;
        let initial = equal_weights(n);

        let solution = match mode {
            OptimizationMode::MaxSharpe => {
                // A zero-variance start leaves the Sharpe ratio undefined.
                evaluate(&initial, mean, cov, self.risk_free_rate)?;
                let objective = NegativeSharpeObjective::new(mean, cov, self.risk_free_rate);
                let problem = ConstrainedProblem::new(&objective, n)
                    .subject_to(Constraint::Budget { total: 1.0 });
                self.solver.minimize(&problem, &initial)?
            }
            OptimizationMode::MinVolatility => {
                let objective = VolatilityObjective::new(cov);
                let problem = ConstrainedProblem::new(&objective, n)
                    .subject_to(Constraint::Budget { total: 1.0 });
                self.solver.minimize(&problem, &initial)?
            }
            OptimizationMode::TargetReturn { target } => {
                self.check_target(target)?;
                let objective = VolatilityObjective::new(cov);
                let problem = ConstrainedProblem::new(&objective, n)
                    .subject_to(Constraint::Budget { total: 1.0 })
                    .subject_to(Constraint::LinearEquality {
                        coefficients: mean.clone(),
                        rhs: target,
                    });
                self.solver.minimize(&problem, &initial)?
            }
        };

        check_weights(&solution.x)?;
        let statistics = evaluate(&solution.x, mean, cov, self.risk_free_rate)?;
        debug!(
            %mode,
            iterations = solution.iterations,
            expected_return = statistics.expected_return,
            volatility = statistics.volatility,
            "optimization converged"
        );

        Ok(OptimizedPortfolio {
            mode,
            symbols: self.stats.symbols.clone(),
            weights: solution.x,
            statistics,
            iterations: solution.iterations,
        })
    }

    fn check_target(&self, target: f64) -> Result<()> {
        let (lo, hi) = (self.stats.min_mean(), self.stats.max_mean());
        let slack = 1e-12 * (1.0 + target.abs());
        if !target.is_finite() || target < lo - slack || target > hi + slack {
            return Err(SolverError::Infeasible {
                reason: format!("target return {target} outside achievable range [{lo}, {hi}]"),
            }
            .into());
        }
        Ok(())
    }
}

/// Every weight in [0, 1] and the sum within tolerance of 1.
fn check_weights(weights: &[f64]) -> Result<()> {
    if let Some(w) = weights
        .iter()
        .find(|w| !(w.is_finite() && **w >= -WEIGHT_TOLERANCE && **w <= 1.0 + WEIGHT_TOLERANCE))
    {
        return Err(SolverError::InvalidSolution {
            reason: format!("weight {w} outside [0, 1]"),
        }
        .into());
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(SolverError::InvalidSolution {
            reason: format!("weights sum to {sum}"),
        }
        .into());
    }
    Ok(())
}
