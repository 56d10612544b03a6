//! Efficient frontier: minimum-volatility portfolios across a sweep of target
//! returns.
//!
//! Targets are equally spaced over `[min μ, max μ]`. A target whose solve fails
//! stays in the sequence as a `Failed` point, so the frontier can be sparse
//! without aborting the whole sweep.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::optimize::{Optimizer, Solver};

/// Default number of frontier points.
pub const DEFAULT_FRONTIER_POINTS: usize = 100;

/// Result of solving one frontier target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrontierOutcome {
    Solved {
        expected_return: f64,
        volatility: f64,
        sharpe: f64,
        weights: Vec<f64>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub target_return: f64,
    pub outcome: FrontierOutcome,
}

impl FrontierPoint {
    pub fn is_solved(&self) -> bool {
        matches!(self.outcome, FrontierOutcome::Solved { .. })
    }

    /// `(expected_return, volatility, sharpe)` when solved.
    pub fn triple(&self) -> Option<(f64, f64, f64)> {
        match &self.outcome {
            FrontierOutcome::Solved {
                expected_return,
                volatility,
                sharpe,
                ..
            } => Some((*expected_return, *volatility, *sharpe)),
            FrontierOutcome::Failed { .. } => None,
        }
    }
}

/// Frontier points ordered by target return.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EfficientFrontier {
    pub symbols: Vec<String>,
    pub points: Vec<FrontierPoint>,
}

impl EfficientFrontier {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn solved(&self) -> impl Iterator<Item = &FrontierPoint> + '_ {
        self.points.iter().filter(|p| p.is_solved())
    }

    pub fn failed_count(&self) -> usize {
        self.points.iter().filter(|p| !p.is_solved()).count()
    }

    /// Solved point with the highest Sharpe ratio.
    pub fn max_sharpe_point(&self) -> Option<&FrontierPoint> {
        self.best_by(|(_, _, sharpe)| sharpe)
    }

    /// Solved point with the lowest volatility.
    pub fn min_volatility_point(&self) -> Option<&FrontierPoint> {
        self.best_by(|(_, vol, _)| -vol)
    }

    fn best_by(&self, key: impl Fn((f64, f64, f64)) -> f64) -> Option<&FrontierPoint> {
        self.points
            .iter()
            .filter_map(|p| p.triple().map(|t| (p, key(t))))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(p, _)| p)
    }
}

/// Sweeps target returns through an `Optimizer`.
#[derive(Debug, Clone, Copy)]
pub struct EfficientFrontierBuilder {
    points: usize,
}

impl Default for EfficientFrontierBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTIER_POINTS)
    }
}

impl EfficientFrontierBuilder {
    pub fn new(points: usize) -> Self {
        Self { points }
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// Equally spaced targets over `[lo, hi]`; one point gives `[lo]`.
    pub fn targets(&self, lo: f64, hi: f64) -> Vec<f64> {
        match self.points {
            0 => Vec::new(),
            1 => vec![lo],
            k => {
                let step = (hi - lo) / (k - 1) as f64;
                (0..k)
                    .map(|i| if i == k - 1 { hi } else { lo + step * i as f64 })
                    .collect()
            }
        }
    }

    /// Lazy sweep: each point is solved when the iterator reaches it.
    pub fn sweep<'o, S: Solver>(
        &self,
        optimizer: &'o Optimizer<'o, S>,
    ) -> Result<impl Iterator<Item = FrontierPoint> + 'o> {
        let targets = self.checked_targets(optimizer)?;
        Ok(targets.into_iter().map(move |t| solve_point(optimizer, t)))
    }

    /// Solve every target sequentially.
    pub fn build<S: Solver>(&self, optimizer: &Optimizer<'_, S>) -> Result<EfficientFrontier> {
        let targets = self.checked_targets(optimizer)?;
        let points = targets
            .into_iter()
            .map(|t| solve_point(optimizer, t))
            .collect();
        Ok(finish(optimizer, points))
    }

    /// Solve targets on the rayon pool. Order and values match `build`.
    pub fn build_parallel<S: Solver>(
        &self,
        optimizer: &Optimizer<'_, S>,
    ) -> Result<EfficientFrontier> {
        let targets = self.checked_targets(optimizer)?;
        let points = targets
            .into_par_iter()
            .map(|t| solve_point(optimizer, t))
            .collect();
        Ok(finish(optimizer, points))
    }

    fn checked_targets<S: Solver>(&self, optimizer: &Optimizer<'_, S>) -> Result<Vec<f64>> {
        let stats = optimizer.statistics();
        if stats.n_assets() == 0 {
            return Err(EngineError::insufficient("frontier assets", 1, 0));
        }
        Ok(self.targets(stats.min_mean(), stats.max_mean()))
    }
}

fn solve_point<S: Solver>(optimizer: &Optimizer<'_, S>, target: f64) -> FrontierPoint {
    let outcome = match optimizer.target_return(target) {
        Ok(p) => FrontierOutcome::Solved {
            expected_return: p.statistics.expected_return,
            volatility: p.statistics.volatility,
            sharpe: p.statistics.sharpe_ratio,
            weights: p.weights,
        },
        Err(e) => {
            warn!(target, error = %e, "frontier point failed");
            FrontierOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };
    FrontierPoint {
        target_return: target,
        outcome,
    }
}

fn finish<S: Solver>(optimizer: &Optimizer<'_, S>, points: Vec<FrontierPoint>) -> EfficientFrontier {
    let frontier = EfficientFrontier {
        symbols: optimizer.statistics().symbols.clone(),
        points,
    };
    debug!(
        points = frontier.len(),
        failed = frontier.failed_count(),
        "frontier built"
    );
    frontier
}
