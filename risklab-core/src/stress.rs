//! Deterministic stress scenarios.
//!
//! Each scenario transforms a return series into a stressed copy; the input is
//! never mutated. VaR and CVaR are then recomputed on the stressed series.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::risk::{conditional_var, historical_var};
use crate::stats::{mean, sample_std};

/// Default portfolio notional for dollar losses.
pub const DEFAULT_NOTIONAL: f64 = 100_000.0;

/// A stress transform and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StressScenario {
    /// Subtract `shock` from every return.
    MarketCrash { shock: f64 },
    /// Redraw the series from Normal(mean, multiplier × std).
    HighVolatility { volatility_multiplier: f64 },
    /// Subtract `shift` from every return.
    Recession { shift: f64 },
    /// Scale every return by `scale`.
    InterestRateShock { scale: f64 },
}

impl StressScenario {
    pub fn market_crash() -> Self {
        Self::MarketCrash { shock: 0.30 }
    }

    pub fn high_volatility() -> Self {
        Self::HighVolatility {
            volatility_multiplier: 2.0,
        }
    }

    pub fn recession() -> Self {
        Self::Recession { shift: 0.02 }
    }

    pub fn interest_rate_shock() -> Self {
        Self::InterestRateShock { scale: 0.8 }
    }

    /// The four scenarios with their default parameters.
    pub fn standard_set() -> Vec<Self> {
        vec![
            Self::market_crash(),
            Self::high_volatility(),
            Self::recession(),
            Self::interest_rate_shock(),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MarketCrash { .. } => "market_crash",
            Self::HighVolatility { .. } => "high_volatility",
            Self::Recession { .. } => "recession",
            Self::InterestRateShock { .. } => "interest_rate_shock",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (label, value, ok) = match *self {
            Self::MarketCrash { shock } => ("shock", shock, shock.is_finite()),
            Self::HighVolatility {
                volatility_multiplier,
            } => (
                "volatility_multiplier",
                volatility_multiplier,
                volatility_multiplier.is_finite() && volatility_multiplier >= 0.0,
            ),
            Self::Recession { shift } => ("shift", shift, shift.is_finite()),
            Self::InterestRateShock { scale } => ("scale", scale, scale.is_finite()),
        };
        if !ok {
            return Err(EngineError::invalid(format!(
                "{}: invalid {label} {value}",
                self.name()
            )));
        }
        Ok(())
    }

    /// Stressed copy of `returns`. Only `HighVolatility` draws from `rng`.
    pub fn apply<R: Rng + ?Sized>(&self, returns: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        self.validate()?;
        if returns.is_empty() {
            return Err(EngineError::insufficient("stress scenario returns", 1, 0));
        }
        let stressed = match *self {
            Self::MarketCrash { shock } => returns.iter().map(|r| r - shock).collect(),
            Self::Recession { shift } => returns.iter().map(|r| r - shift).collect(),
            Self::InterestRateShock { scale } => returns.iter().map(|r| r * scale).collect(),
            Self::HighVolatility {
                volatility_multiplier,
            } => {
                let mu = mean(returns);
                let sigma = sample_std(returns) * volatility_multiplier;
                let normal = Normal::new(mu, sigma)
                    .map_err(|e| EngineError::invalid(format!("{}: {e}", self.name())))?;
                (0..returns.len()).map(|_| normal.sample(rng)).collect()
            }
        };
        Ok(stressed)
    }
}

/// Risk figures of one stressed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    pub scenario: StressScenario,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    /// `var_95 × notional`; negative is a loss.
    pub expected_dollar_loss: f64,
}

impl StressResult {
    pub fn name(&self) -> &'static str {
        self.scenario.name()
    }
}

/// Runs scenarios against one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StressTester {
    notional: f64,
}

impl Default for StressTester {
    fn default() -> Self {
        Self {
            notional: DEFAULT_NOTIONAL,
        }
    }
}

impl StressTester {
    pub fn new(notional: f64) -> Result<Self> {
        if !(notional.is_finite() && notional > 0.0) {
            return Err(EngineError::invalid(format!(
                "notional must be positive, got {notional}"
            )));
        }
        Ok(Self { notional })
    }

    pub fn notional(&self) -> f64 {
        self.notional
    }

    pub fn run_scenario<R: Rng + ?Sized>(
        &self,
        returns: &[f64],
        scenario: StressScenario,
        rng: &mut R,
    ) -> Result<StressResult> {
        let stressed = scenario.apply(returns, rng)?;
        let var_95 = historical_var(&stressed, 0.95)?;
        let result = StressResult {
            scenario,
            var_95,
            var_99: historical_var(&stressed, 0.99)?,
            cvar_95: conditional_var(&stressed, 0.95)?,
            expected_dollar_loss: var_95 * self.notional,
        };
        debug!(scenario = scenario.name(), var_95, "stress scenario evaluated");
        Ok(result)
    }

    /// Results in scenario order. The first failing scenario aborts the run.
    pub fn run<R: Rng + ?Sized>(
        &self,
        returns: &[f64],
        scenarios: &[StressScenario],
        rng: &mut R,
    ) -> Result<Vec<StressResult>> {
        scenarios
            .iter()
            .map(|s| self.run_scenario(returns, *s, rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn market_crash_shifts_constant_series() {
        let returns = [0.001; 50];
        let stressed = StressScenario::market_crash()
            .apply(&returns, &mut rng())
            .unwrap();
        assert!(stressed.iter().all(|r| (r - (0.001 - 0.30)).abs() < 1e-15));

        let result = StressTester::default()
            .run_scenario(&returns, StressScenario::market_crash(), &mut rng())
            .unwrap();
        assert!((result.var_95 - (0.001 - 0.30)).abs() < 1e-12, "got {}", result.var_95);
        assert!((result.expected_dollar_loss - (0.001 - 0.30) * 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn input_is_not_mutated() {
        let returns = vec![0.01, -0.02, 0.03];
        let copy = returns.clone();
        for s in StressScenario::standard_set() {
            s.apply(&returns, &mut rng()).unwrap();
        }
        assert_eq!(returns, copy);
    }

    #[test]
    fn recession_and_rate_shock() {
        let returns = [0.01, -0.01];
        let rec = StressScenario::recession().apply(&returns, &mut rng()).unwrap();
        assert!((rec[0] - (-0.01)).abs() < 1e-15 && (rec[1] - (-0.03)).abs() < 1e-15);
        let shock = StressScenario::interest_rate_shock()
            .apply(&returns, &mut rng())
            .unwrap();
        assert!((shock[0] - 0.008).abs() < 1e-15 && (shock[1] + 0.008).abs() < 1e-15);
    }

    #[test]
    fn high_volatility_widens_dispersion() {
        let returns: Vec<f64> = (0..2_000).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let stressed = StressScenario::high_volatility()
            .apply(&returns, &mut rng())
            .unwrap();
        assert_eq!(stressed.len(), returns.len());
        let ratio = sample_std(&stressed) / sample_std(&returns);
        assert!((ratio - 2.0).abs() < 0.1, "got {ratio}");
    }

    #[test]
    fn seeded_runs_are_identical() {
        let returns = [0.01, -0.02, 0.015, -0.005, 0.002];
        let scenarios = StressScenario::standard_set();
        let tester = StressTester::default();
        let a = tester.run(&returns, &scenarios, &mut rng()).unwrap();
        let b = tester.run(&returns, &scenarios, &mut rng()).unwrap();
        assert_eq!(a, b);
        let names: Vec<&str> = a.iter().map(StressResult::name).collect();
        assert_eq!(
            names,
            ["market_crash", "high_volatility", "recession", "interest_rate_shock"]
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let bad = StressScenario::HighVolatility {
            volatility_multiplier: -1.0,
        };
        assert!(bad.apply(&[0.01, 0.02], &mut rng()).is_err());
        assert!(StressTester::new(0.0).is_err());
    }

    #[test]
    fn scenarios_serialize_with_type_tag() {
        let json = serde_json::to_string(&StressScenario::market_crash()).unwrap();
        assert_eq!(json, r#"{"type":"MARKET_CRASH","shock":0.3}"#);
    }
}
