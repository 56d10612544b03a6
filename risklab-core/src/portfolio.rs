//! Portfolio evaluation: expected return, volatility and Sharpe ratio of a
//! weight vector. Every optimizer, the frontier and the Monte Carlo sampler
//! score portfolios through this module.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::stats::{AnnualizedStatistics, CovarianceMatrix};

/// Default annual risk-free rate.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Volatility below this is treated as zero.
pub(crate) const ZERO_VOLATILITY: f64 = 1e-15;

/// Annualized figures for one weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStatistics {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
}

/// w·μ
pub fn expected_return(weights: &[f64], mean: &[f64]) -> f64 {
    weights.iter().zip(mean).map(|(w, m)| w * m).sum()
}

/// sqrt(wᵀΣw), clamped at zero against round-off.
pub fn volatility(weights: &[f64], cov: &CovarianceMatrix) -> f64 {
    cov.quad_form(weights).max(0.0).sqrt()
}

/// Score a weight vector.
///
/// Fails with `DegenerateVolatility` instead of dividing by a zero volatility.
pub fn evaluate(
    weights: &[f64],
    mean: &[f64],
    cov: &CovarianceMatrix,
    risk_free_rate: f64,
) -> Result<PortfolioStatistics> {
    if weights.len() != mean.len() || mean.len() != cov.dim() {
        return Err(EngineError::invalid(format!(
            "{} weights for {} means and a {}x{} covariance",
            weights.len(),
            mean.len(),
            cov.dim(),
            cov.dim()
        )));
    }
    let ret = expected_return(weights, mean);
    let vol = volatility(weights, cov);
    if vol < ZERO_VOLATILITY {
        return Err(EngineError::DegenerateVolatility {
            context: "portfolio",
        });
    }
    Ok(PortfolioStatistics {
        expected_return: ret,
        volatility: vol,
        sharpe_ratio: (ret - risk_free_rate) / vol,
    })
}

/// 1/N for each of `n` assets.
pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Scores weight vectors against one set of statistics and a risk-free rate.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioEvaluator<'a> {
    stats: &'a AnnualizedStatistics,
    risk_free_rate: f64,
}

impl<'a> PortfolioEvaluator<'a> {
    pub fn new(stats: &'a AnnualizedStatistics, risk_free_rate: f64) -> Self {
        Self {
            stats,
            risk_free_rate,
        }
    }

    pub fn statistics(&self) -> &'a AnnualizedStatistics {
        self.stats
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn evaluate(&self, weights: &[f64]) -> Result<PortfolioStatistics> {
        evaluate(
            weights,
            &self.stats.mean,
            &self.stats.covariance,
            self.risk_free_rate,
        )
    }

    pub fn equal_weight(&self) -> Result<PortfolioStatistics> {
        self.evaluate(&equal_weights(self.stats.n_assets()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(mean: Vec<f64>, cov: Vec<Vec<f64>>) -> AnnualizedStatistics {
        let symbols = (0..mean.len()).map(|i| format!("A{i}")).collect();
        AnnualizedStatistics::new(symbols, mean, CovarianceMatrix::new(cov).unwrap()).unwrap()
    }

    #[test]
    fn evaluates_two_asset_portfolio() {
        let s = stats(vec![0.10, 0.20], vec![vec![0.04, 0.0], vec![0.0, 0.09]]);
        let p = PortfolioEvaluator::new(&s, 0.02).evaluate(&[0.5, 0.5]).unwrap();
        assert_relative_eq!(p.expected_return, 0.15, epsilon = 1e-15);
        assert_relative_eq!(p.volatility, (0.25 * 0.04 + 0.25 * 0.09_f64).sqrt(), epsilon = 1e-15);
        assert_relative_eq!(p.sharpe_ratio, 0.13 / p.volatility, epsilon = 1e-12);
    }

    #[test]
    fn zero_variance_asset_is_degenerate() {
        let s = stats(vec![0.03], vec![vec![0.0]]);
        assert!(matches!(
            PortfolioEvaluator::new(&s, 0.02).evaluate(&[1.0]),
            Err(EngineError::DegenerateVolatility { .. })
        ));
    }

    #[test]
    fn all_zero_weights_are_degenerate() {
        let s = stats(vec![0.10], vec![vec![0.04]]);
        assert!(matches!(
            PortfolioEvaluator::new(&s, 0.02).evaluate(&[0.0]),
            Err(EngineError::DegenerateVolatility { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_is_invalid() {
        let s = stats(vec![0.10, 0.05], vec![vec![0.04, 0.0], vec![0.0, 0.01]]);
        assert!(matches!(
            PortfolioEvaluator::new(&s, 0.02).evaluate(&[1.0]),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn identical_correlated_assets_keep_single_asset_sharpe() {
        // Same mean, same variance, perfectly correlated.
        let var = 0.04;
        let s = stats(vec![0.10; 3], vec![vec![var; 3]; 3]);
        let single = PortfolioEvaluator::new(&s, 0.02)
            .evaluate(&[1.0, 0.0, 0.0])
            .unwrap();
        let equal = PortfolioEvaluator::new(&s, 0.02).equal_weight().unwrap();
        assert_relative_eq!(equal.sharpe_ratio, single.sharpe_ratio, epsilon = 1e-12);
    }

    #[test]
    fn uncorrelated_identical_assets_scale_sharpe_by_sqrt_n() {
        let n = 4;
        let s = stats(
            vec![0.10; n],
            CovarianceMatrix::diagonal(&vec![0.04; n]).unwrap().rows().to_vec(),
        );
        let eval = PortfolioEvaluator::new(&s, 0.02);
        let single = eval.evaluate(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        let equal = eval.equal_weight().unwrap();
        assert_relative_eq!(
            equal.sharpe_ratio,
            single.sharpe_ratio * (n as f64).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn equal_weights_sum_to_one() {
        let w = equal_weights(7);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(equal_weights(0).is_empty());
    }
}
