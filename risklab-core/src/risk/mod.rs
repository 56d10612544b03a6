//! Tail risk and risk-adjusted performance of a single return series.
//!
//! The series may be one asset or a weighted portfolio
//! (`ReturnMatrix::portfolio_returns`). Fewer than
//! `LOW_CONFIDENCE_OBSERVATIONS` points still produce figures; they are
//! flagged low-confidence in the report rather than rejected.

pub mod metrics;
pub mod var;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub use metrics::{
    annual_return, annual_volatility, beta, calmar_ratio, max_drawdown, sharpe_ratio,
    sortino_ratio, wealth_curve,
};
pub use var::{
    conditional_var, historical_var, monte_carlo_var, parametric_var, DEFAULT_VAR_SIMULATIONS,
    LOW_CONFIDENCE_OBSERVATIONS,
};

use crate::error::Result;
use crate::portfolio::DEFAULT_RISK_FREE_RATE;
use crate::stats::TRADING_DAYS_PER_YEAR;

/// Full risk summary of one return series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub max_drawdown: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    /// `None` when the downside deviation is undefined.
    pub sortino: Option<f64>,
    pub calmar: f64,
    pub observations: usize,
}

impl RiskReport {
    pub fn is_low_confidence(&self) -> bool {
        self.observations < LOW_CONFIDENCE_OBSERVATIONS
    }

    pub fn from_parts(tail: TailRisk, ratios: RiskRatios) -> Self {
        Self {
            var_95: tail.var_95,
            var_99: tail.var_99,
            cvar_95: tail.cvar_95,
            cvar_99: tail.cvar_99,
            max_drawdown: tail.max_drawdown,
            annual_return: tail.annual_return,
            annual_volatility: tail.annual_volatility,
            sharpe: ratios.sharpe,
            sortino: ratios.sortino,
            calmar: ratios.calmar,
            observations: tail.observations,
        }
    }
}

/// The part of a `RiskReport` that is defined for any series of two or more
/// observations, constant ones included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailRisk {
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub max_drawdown: f64,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub observations: usize,
}

impl TailRisk {
    pub fn is_low_confidence(&self) -> bool {
        self.observations < LOW_CONFIDENCE_OBSERVATIONS
    }
}

/// Risk-adjusted ratios; undefined for a zero-volatility series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskRatios {
    pub sharpe: f64,
    /// `None` when the downside deviation is undefined.
    pub sortino: Option<f64>,
    pub calmar: f64,
}

/// VaR at one confidence level under the three estimators.
///
/// A large gap between `historical` and `parametric` means the normal fit is poor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarEstimates {
    pub confidence: f64,
    pub historical: f64,
    pub parametric: f64,
    pub monte_carlo: f64,
}

/// Computes risk reports with a fixed risk-free rate and annualization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetricsEngine {
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    pub simulations: usize,
}

impl Default for RiskMetricsEngine {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: TRADING_DAYS_PER_YEAR as f64,
            simulations: DEFAULT_VAR_SIMULATIONS,
        }
    }
}

impl RiskMetricsEngine {
    pub fn new(risk_free_rate: f64, periods_per_year: u32, simulations: usize) -> Self {
        Self {
            risk_free_rate,
            periods_per_year: periods_per_year as f64,
            simulations,
        }
    }

    /// Historical VaR/CVaR at 95% and 99%, drawdown and ratios.
    ///
    /// Needs at least two observations; a constant series fails with
    /// `DegenerateVolatility` because its Sharpe ratio is undefined. Use
    /// [`tail_risk`](Self::tail_risk) and [`ratios`](Self::ratios) to keep the
    /// tail figures when the ratios fail.
    pub fn report(&self, returns: &[f64]) -> Result<RiskReport> {
        Ok(RiskReport::from_parts(
            self.tail_risk(returns)?,
            self.ratios(returns)?,
        ))
    }

    /// Historical VaR/CVaR at 95% and 99%, drawdown, annual return and
    /// volatility. Needs at least two observations.
    pub fn tail_risk(&self, returns: &[f64]) -> Result<TailRisk> {
        let ppy = self.periods_per_year;
        Ok(TailRisk {
            var_95: historical_var(returns, 0.95)?,
            var_99: historical_var(returns, 0.99)?,
            cvar_95: conditional_var(returns, 0.95)?,
            cvar_99: conditional_var(returns, 0.99)?,
            max_drawdown: max_drawdown(returns)?,
            annual_return: annual_return(returns, ppy)?,
            annual_volatility: annual_volatility(returns, ppy)?,
            observations: returns.len(),
        })
    }

    /// Sharpe, Sortino and Calmar. A constant series fails with
    /// `DegenerateVolatility`.
    pub fn ratios(&self, returns: &[f64]) -> Result<RiskRatios> {
        let ppy = self.periods_per_year;
        Ok(RiskRatios {
            sharpe: sharpe_ratio(returns, self.risk_free_rate, ppy)?,
            sortino: sortino_ratio(returns, self.risk_free_rate, ppy)?,
            calmar: calmar_ratio(returns, ppy)?,
        })
    }

    /// Historical, parametric and Monte Carlo VaR at `confidence`.
    pub fn var_estimates<R: Rng + ?Sized>(
        &self,
        returns: &[f64],
        confidence: f64,
        rng: &mut R,
    ) -> Result<VarEstimates> {
        Ok(VarEstimates {
            confidence,
            historical: historical_var(returns, confidence)?,
            parametric: parametric_var(returns, confidence)?,
            monte_carlo: monte_carlo_var(returns, confidence, self.simulations, rng)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn series() -> Vec<f64> {
        (0..60)
            .map(|i| 0.004 * ((i as f64) * 0.7).sin() + 0.0005)
            .collect()
    }

    #[test]
    fn report_is_internally_consistent() {
        let engine = RiskMetricsEngine::default();
        let r = engine.report(&series()).unwrap();
        assert_eq!(r.observations, 60);
        assert!(!r.is_low_confidence());
        assert!(r.var_99 <= r.var_95);
        assert!(r.cvar_95 <= r.var_95);
        assert!(r.cvar_99 <= r.var_99);
        assert!(r.max_drawdown <= 0.0);
        assert!(r.annual_volatility > 0.0);
        let expected = (r.annual_return - 0.02) / r.annual_volatility;
        assert!((r.sharpe - expected).abs() < 1e-12);
    }

    #[test]
    fn short_series_is_low_confidence() {
        let r = RiskMetricsEngine::default()
            .report(&[0.01, -0.02, 0.005])
            .unwrap();
        assert!(r.is_low_confidence());
    }

    #[test]
    fn report_of_single_observation_is_insufficient() {
        assert!(matches!(
            RiskMetricsEngine::default().report(&[0.01]),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn constant_series_keeps_tail_risk_but_not_ratios() {
        let engine = RiskMetricsEngine::default();
        let flat = vec![0.001; 30];
        let tail = engine.tail_risk(&flat).unwrap();
        assert!((tail.var_95 - 0.001).abs() < 1e-15);
        assert!((tail.cvar_99 - 0.001).abs() < 1e-15);
        assert_eq!(tail.max_drawdown, 0.0);
        assert!(tail.annual_volatility < 1e-12);
        assert!(matches!(
            engine.ratios(&flat),
            Err(EngineError::DegenerateVolatility { .. })
        ));
        assert!(engine.report(&flat).is_err());
    }

    #[test]
    fn report_is_tail_plus_ratios() {
        let engine = RiskMetricsEngine::default();
        let r = engine.report(&series()).unwrap();
        let tail = engine.tail_risk(&series()).unwrap();
        let ratios = engine.ratios(&series()).unwrap();
        assert_eq!(r, RiskReport::from_parts(tail, ratios));
    }

    #[test]
    fn var_estimates_agree_on_a_symmetric_series() {
        let engine = RiskMetricsEngine::new(0.02, 252, 20_000);
        let mut rng = StdRng::seed_from_u64(42);
        let est = engine.var_estimates(&series(), 0.95, &mut rng).unwrap();
        assert_eq!(est.confidence, 0.95);
        assert!(est.historical < 0.0 && est.parametric < 0.0 && est.monte_carlo < 0.0);
        assert!((est.parametric - est.monte_carlo).abs() < 5e-4);
    }
}
