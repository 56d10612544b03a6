//! Constrained minimization.
//!
//! `ProjectedLagrangianSolver` handles the bounds, the budget and the first
//! linear equality exactly by projection, and every other linear constraint
//! through an augmented Lagrangian. The inner loop is projected gradient
//! descent with Armijo backtracking; the outer loop updates multipliers and
//! grows the penalty until the constraints are met. Both loops are capped.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::problem::{ConstrainedProblem, Constraint, Objective};
use super::projection::Projector;

const ARMIJO: f64 = 1e-4;
const MIN_STEP: f64 = 1e-20;
const MAX_STEP: f64 = 1e6;
const MAX_PENALTY: f64 = 1e10;
/// A line search that can no longer make progress still counts as converged
/// when the projected gradient is this small (relative to the gradient).
const STALL_TOLERANCE: f64 = 1e-6;

/// Solver failures. Surfaced to callers as `EngineError::OptimizationFailed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error(
        "did not converge after {iterations} iterations \
         (stationarity {stationarity:.3e}, constraint violation {violation:.3e})"
    )]
    NotConverged {
        iterations: usize,
        stationarity: f64,
        violation: f64,
    },

    #[error("infeasible problem: {reason}")]
    Infeasible { reason: String },

    #[error("objective is not finite after {iterations} iterations")]
    NonFiniteObjective { iterations: usize },

    #[error("invalid problem: {reason}")]
    InvalidProblem { reason: String },

    #[error("solution rejected: {reason}")]
    InvalidSolution { reason: String },
}

impl SolverError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidProblem {
            reason: reason.into(),
        }
    }
}

/// Iteration caps and tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Projected-gradient iterations per outer iteration (default 10,000).
    pub max_iterations: usize,
    /// Augmented Lagrangian outer iterations (default 50).
    pub max_outer_iterations: usize,
    /// Projected-gradient stationarity tolerance, relative to `1 + ‖∇f‖∞`
    /// (default 1e-9).
    pub tolerance: f64,
    /// Maximum allowed constraint violation (default 1e-9).
    pub feasibility_tolerance: f64,
    /// Starting penalty weight (default 100).
    pub initial_penalty: f64,
    /// Penalty multiplier when the violation stalls (default 10).
    pub penalty_growth: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            max_outer_iterations: 50,
            tolerance: 1e-9,
            feasibility_tolerance: 1e-9,
            initial_penalty: 100.0,
            penalty_growth: 10.0,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.max_iterations == 0 || self.max_outer_iterations == 0 {
            return Err(SolverError::invalid("iteration caps must be positive"));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.tolerance) || !positive(self.feasibility_tolerance) {
            return Err(SolverError::invalid("tolerances must be positive"));
        }
        let growth_ok = self.penalty_growth.is_finite() && self.penalty_growth > 1.0;
        if !positive(self.initial_penalty) || !growth_ok {
            return Err(SolverError::invalid(
                "penalty must be positive and its growth factor above 1",
            ));
        }
        Ok(())
    }
}

/// A converged point.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub x: Vec<f64>,
    pub objective: f64,
    /// Total inner iterations.
    pub iterations: usize,
    pub outer_iterations: usize,
    pub max_violation: f64,
}

/// Minimizes a `ConstrainedProblem` from a starting point.
pub trait Solver: Send + Sync {
    fn minimize(
        &self,
        problem: &ConstrainedProblem<'_>,
        initial: &[f64],
    ) -> Result<Solution, SolverError>;
}

/// Augmented Lagrangian outer loop around projected gradient descent.
#[derive(Debug, Clone, Default)]
pub struct ProjectedLagrangianSolver {
    config: SolverConfig,
}

impl ProjectedLagrangianSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl Solver for ProjectedLagrangianSolver {
    fn minimize(
        &self,
        problem: &ConstrainedProblem<'_>,
        initial: &[f64],
    ) -> Result<Solution, SolverError> {
        self.config.validate()?;
        problem.validate()?;
        let n = problem.dimension();
        if initial.len() != n {
            return Err(SolverError::invalid(format!(
                "initial point has {} entries for {n} variables",
                initial.len()
            )));
        }

        let projector = Projector::new(problem)?;
        let mut x = vec![0.0; n];
        projector.project(initial, &mut x);

        let projected = projector.equality_index();
        let general: Vec<&Constraint> = problem
            .constraints()
            .iter()
            .enumerate()
            .filter(|(i, c)| !matches!(c, Constraint::Budget { .. }) && Some(*i) != projected)
            .map(|(_, c)| c)
            .collect();
        let mut multipliers = vec![0.0; general.len()];
        let mut penalty = self.config.initial_penalty;
        let mut previous_violation = f64::INFINITY;
        let mut total_iterations = 0;
        let mut last = (f64::INFINITY, f64::INFINITY);

        for outer in 1..=self.config.max_outer_iterations {
            let lagrangian = AugmentedLagrangian {
                objective: problem.objective(),
                constraints: &general,
                multipliers: &multipliers,
                penalty,
            };
            let descent = projected_descent(&lagrangian, &projector, &mut x, &self.config)
                .map_err(|_| SolverError::NonFiniteObjective {
                    iterations: total_iterations,
                })?;
            total_iterations += descent.iterations;

            let violation = general
                .iter()
                .map(|c| c.violation(&x))
                .fold(0.0, f64::max);
            last = (descent.stationarity, violation);
            trace!(
                outer,
                iterations = descent.iterations,
                stationarity = descent.stationarity,
                violation,
                penalty,
                "outer iteration"
            );

            if descent.converged && violation <= self.config.feasibility_tolerance {
                let objective = problem.objective().value(&x);
                if !objective.is_finite() {
                    return Err(SolverError::NonFiniteObjective {
                        iterations: total_iterations,
                    });
                }
                debug!(
                    iterations = total_iterations,
                    outer, objective, "solver converged"
                );
                return Ok(Solution {
                    max_violation: problem.max_violation(&x),
                    x,
                    objective,
                    iterations: total_iterations,
                    outer_iterations: outer,
                });
            }

            if general.is_empty() {
                break;
            }

            for (m, c) in multipliers.iter_mut().zip(&general) {
                match c {
                    Constraint::LinearEquality { .. } => *m += penalty * c.residual(&x),
                    Constraint::LinearInequality { .. } => {
                        *m = (*m - penalty * c.residual(&x)).max(0.0)
                    }
                    Constraint::Budget { .. } => {}
                }
            }
            if violation > 0.25 * previous_violation {
                penalty = (penalty * self.config.penalty_growth).min(MAX_PENALTY);
            }
            previous_violation = violation;
        }

        debug!(
            iterations = total_iterations,
            stationarity = last.0,
            violation = last.1,
            "solver did not converge"
        );
        Err(SolverError::NotConverged {
            iterations: total_iterations,
            stationarity: last.0,
            violation: last.1,
        })
    }
}

// ─── Augmented Lagrangian ───────────────────────────────────────────

/// f(x) + Σ_eq [λh + ρh²/2] + Σ_ineq [(max(0, μ − ρg)² − μ²) / 2ρ]
struct AugmentedLagrangian<'a> {
    objective: &'a dyn Objective,
    constraints: &'a [&'a Constraint],
    multipliers: &'a [f64],
    penalty: f64,
}

impl Objective for AugmentedLagrangian<'_> {
    fn value(&self, x: &[f64]) -> f64 {
        let mut total = self.objective.value(x);
        for (c, &m) in self.constraints.iter().zip(self.multipliers) {
            let r = c.residual(x);
            total += match c {
                Constraint::LinearEquality { .. } => m * r + 0.5 * self.penalty * r * r,
                Constraint::LinearInequality { .. } => {
                    let shifted = (m - self.penalty * r).max(0.0);
                    (shifted * shifted - m * m) / (2.0 * self.penalty)
                }
                Constraint::Budget { .. } => 0.0,
            };
        }
        total
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        self.objective.gradient(x, grad);
        for (c, &m) in self.constraints.iter().zip(self.multipliers) {
            let r = c.residual(x);
            let (scale, coefficients) = match c {
                Constraint::LinearEquality { coefficients, .. } => {
                    (m + self.penalty * r, coefficients)
                }
                Constraint::LinearInequality { coefficients, .. } => {
                    (-(m - self.penalty * r).max(0.0), coefficients)
                }
                Constraint::Budget { .. } => continue,
            };
            for (g, a) in grad.iter_mut().zip(coefficients) {
                *g += scale * a;
            }
        }
    }
}

// ─── Projected gradient descent ─────────────────────────────────────

struct Descent {
    iterations: usize,
    stationarity: f64,
    converged: bool,
}

struct NonFinite;

/// Minimize `objective` over the projector's set starting from `x` (in place).
///
/// Stationarity is `‖x − P(x − ∇f(x))‖∞`, which vanishes exactly at KKT
/// points of the projected problem, measured against the tolerance scaled by
/// `1 + ‖∇f(x)‖∞`.
fn projected_descent(
    objective: &dyn Objective,
    projector: &Projector<'_>,
    x: &mut [f64],
    config: &SolverConfig,
) -> Result<Descent, NonFinite> {
    let n = x.len();
    let mut grad = vec![0.0; n];
    let mut trial = vec![0.0; n];
    let mut scratch = vec![0.0; n];
    let mut step = 1.0;
    let mut fx = objective.value(x);
    if !fx.is_finite() {
        return Err(NonFinite);
    }
    let mut stationarity = f64::INFINITY;

    for iteration in 0..config.max_iterations {
        objective.gradient(x, &mut grad);
        if grad.iter().any(|g| !g.is_finite()) {
            return Err(NonFinite);
        }

        for i in 0..n {
            scratch[i] = x[i] - grad[i];
        }
        projector.project(&scratch, &mut trial);
        stationarity = max_abs_diff(x, &trial);
        let scale = 1.0 + grad.iter().fold(0.0, |m: f64, g| m.max(g.abs()));
        if stationarity <= config.tolerance * scale {
            return Ok(Descent {
                iterations: iteration,
                stationarity,
                converged: true,
            });
        }

        // Armijo backtracking along the projection arc
        let f_trial = loop {
            for i in 0..n {
                scratch[i] = x[i] - step * grad[i];
            }
            projector.project(&scratch, &mut trial);
            let predicted: f64 = grad
                .iter()
                .zip(trial.iter().zip(x.iter()))
                .map(|(g, (t, xi))| g * (t - xi))
                .sum();
            let f_trial = objective.value(&trial);
            if f_trial.is_finite() && f_trial <= fx + ARMIJO * predicted {
                break f_trial;
            }
            step *= 0.5;
            if step < MIN_STEP {
                return Ok(Descent {
                    iterations: iteration,
                    stationarity,
                    converged: stationarity <= STALL_TOLERANCE * scale,
                });
            }
        };

        x.copy_from_slice(&trial);
        fx = f_trial;
        step = (step * 2.0).min(MAX_STEP);
    }

    Ok(Descent {
        iterations: config.max_iterations,
        stationarity,
        converged: false,
    })
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
