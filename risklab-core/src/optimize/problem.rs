//! Explicit description of a constrained minimization problem.
//!
//! A `ConstrainedProblem` bundles an objective, per-variable bounds and a list
//! of linear constraints. Solvers receive the whole value; nothing is captured
//! in closures.

use serde::{Deserialize, Serialize};

use super::solver::SolverError;

/// A smooth objective with an analytic gradient.
pub trait Objective: Send + Sync {
    /// Objective value at `x`. May return `f64::INFINITY` outside the domain.
    fn value(&self, x: &[f64]) -> f64;

    /// Write ∇f(x) into `grad` (same length as `x`).
    fn gradient(&self, x: &[f64], grad: &mut [f64]);
}

/// Closed interval `[lower, upper]` for one variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// Long-only weight bounds.
    pub const UNIT: Self = Self {
        lower: 0.0,
        upper: 1.0,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, x: f64, tolerance: f64) -> bool {
        x >= self.lower - tolerance && x <= self.upper + tolerance
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::UNIT
    }
}

/// Linear constraints understood by the solvers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    /// Σx = total. Enforced by projection together with the bounds.
    Budget { total: f64 },

    /// a·x = rhs
    LinearEquality { coefficients: Vec<f64>, rhs: f64 },

    /// a·x ≥ rhs
    LinearInequality { coefficients: Vec<f64>, rhs: f64 },
}

impl Constraint {
    /// Signed residual: `Σx - total` or `a·x - rhs`.
    pub fn residual(&self, x: &[f64]) -> f64 {
        match self {
            Constraint::Budget { total } => x.iter().sum::<f64>() - total,
            Constraint::LinearEquality { coefficients, rhs }
            | Constraint::LinearInequality { coefficients, rhs } => dot(coefficients, x) - rhs,
        }
    }

    /// Non-negative amount by which `x` violates the constraint.
    pub fn violation(&self, x: &[f64]) -> f64 {
        match self {
            Constraint::Budget { .. } | Constraint::LinearEquality { .. } => {
                self.residual(x).abs()
            }
            Constraint::LinearInequality { .. } => (-self.residual(x)).max(0.0),
        }
    }

    fn coefficient_len(&self) -> Option<usize> {
        match self {
            Constraint::Budget { .. } => None,
            Constraint::LinearEquality { coefficients, .. }
            | Constraint::LinearInequality { coefficients, .. } => Some(coefficients.len()),
        }
    }
}

/// Objective + bounds + constraints over `dimension` variables.
pub struct ConstrainedProblem<'a> {
    objective: &'a dyn Objective,
    bounds: Vec<Bounds>,
    constraints: Vec<Constraint>,
}

impl<'a> ConstrainedProblem<'a> {
    /// New problem with `[0, 1]` bounds on every variable and no constraints.
    pub fn new(objective: &'a dyn Objective, dimension: usize) -> Self {
        Self {
            objective,
            bounds: vec![Bounds::UNIT; dimension],
            constraints: Vec::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: Vec<Bounds>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn subject_to(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn dimension(&self) -> usize {
        self.bounds.len()
    }

    pub fn objective(&self) -> &'a dyn Objective {
        self.objective
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Budget total, if a budget constraint is present.
    pub fn budget(&self) -> Option<f64> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Budget { total } => Some(*total),
            _ => None,
        })
    }

    /// Largest violation over bounds and constraints.
    pub fn max_violation(&self, x: &[f64]) -> f64 {
        let bound_violation = self
            .bounds
            .iter()
            .zip(x)
            .map(|(b, &v)| (b.lower - v).max(v - b.upper).max(0.0))
            .fold(0.0, f64::max);
        self.constraints
            .iter()
            .map(|c| c.violation(x))
            .fold(bound_violation, f64::max)
    }

    /// Check dimensions and parameter sanity.
    pub fn validate(&self) -> Result<(), SolverError> {
        let n = self.dimension();
        if n == 0 {
            return Err(SolverError::invalid("problem has no variables"));
        }
        for (i, b) in self.bounds.iter().enumerate() {
            if !(b.lower.is_finite() && b.upper.is_finite()) || b.lower > b.upper {
                return Err(SolverError::invalid(format!(
                    "bounds for variable {i} are [{}, {}]",
                    b.lower, b.upper
                )));
            }
        }
        let budgets = self
            .constraints
            .iter()
            .filter(|c| matches!(c, Constraint::Budget { .. }))
            .count();
        if budgets > 1 {
            return Err(SolverError::invalid("more than one budget constraint"));
        }
        for c in &self.constraints {
            if let Some(len) = c.coefficient_len() {
                if len != n {
                    return Err(SolverError::invalid(format!(
                        "constraint has {len} coefficients for {n} variables"
                    )));
                }
            }
            let finite = match c {
                Constraint::Budget { total } => total.is_finite(),
                Constraint::LinearEquality { coefficients, rhs }
                | Constraint::LinearInequality { coefficients, rhs } => {
                    rhs.is_finite() && coefficients.iter().all(|a| a.is_finite())
                }
            };
            if !finite {
                return Err(SolverError::invalid("constraint has non-finite parameters"));
            }
        }
        Ok(())
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Zero;

    impl Objective for Zero {
        fn value(&self, _x: &[f64]) -> f64 {
            0.0
        }
        fn gradient(&self, _x: &[f64], grad: &mut [f64]) {
            grad.fill(0.0);
        }
    }

    #[test]
    fn residuals_and_violations() {
        let x = [0.2, 0.3, 0.4];
        let budget = Constraint::Budget { total: 1.0 };
        assert!((budget.residual(&x) + 0.1).abs() < 1e-12);
        assert!((budget.violation(&x) - 0.1).abs() < 1e-12);

        let ineq = Constraint::LinearInequality {
            coefficients: vec![1.0, 0.0, 0.0],
            rhs: 0.1,
        };
        assert_eq!(ineq.violation(&x), 0.0);
        let ineq = Constraint::LinearInequality {
            coefficients: vec![1.0, 0.0, 0.0],
            rhs: 0.5,
        };
        assert!((ineq.violation(&x) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn validate_rejects_mismatched_coefficients() {
        let p = ConstrainedProblem::new(&Zero, 3).subject_to(Constraint::LinearEquality {
            coefficients: vec![1.0, 2.0],
            rhs: 0.0,
        });
        assert!(matches!(p.validate(), Err(SolverError::InvalidProblem { .. })));
    }

    #[test]
    fn validate_rejects_two_budgets() {
        let p = ConstrainedProblem::new(&Zero, 2)
            .subject_to(Constraint::Budget { total: 1.0 })
            .subject_to(Constraint::Budget { total: 1.0 });
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let p = ConstrainedProblem::new(&Zero, 1).with_bounds(vec![Bounds::new(1.0, 0.0)]);
        assert!(p.validate().is_err());
    }

    #[test]
    fn max_violation_covers_bounds() {
        let p = ConstrainedProblem::new(&Zero, 2).subject_to(Constraint::Budget { total: 1.0 });
        assert!((p.max_violation(&[1.2, -0.2]) - 0.2).abs() < 1e-12);
        assert_eq!(p.budget(), Some(1.0));
    }
}
