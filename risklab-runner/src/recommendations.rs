//! Rule-based risk recommendations for the analyzed portfolio.
//!
//! Each rule compares one portfolio figure against a configurable threshold.
//! When no rule fires the report carries a single `Acceptable` entry.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Thresholds that trigger a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    /// Annual volatility above this suggests smaller positions.
    pub max_volatility: f64,
    /// |max drawdown| above this suggests a stop-loss policy.
    pub max_drawdown: f64,
    /// Sharpe ratio below this suggests re-optimizing.
    pub min_sharpe: f64,
    /// |dollar VaR 95| above this fraction of notional suggests diversifying.
    pub max_var_fraction: f64,
    /// Average pairwise correlation above this suggests other asset classes.
    pub max_average_correlation: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            max_volatility: 0.25,
            max_drawdown: 0.20,
            min_sharpe: 1.0,
            max_var_fraction: 0.05,
            max_average_correlation: 0.7,
        }
    }
}

impl RecommendationThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_volatility", self.max_volatility),
            ("max_drawdown", self.max_drawdown),
            ("min_sharpe", self.min_sharpe),
            ("max_var_fraction", self.max_var_fraction),
            ("max_average_correlation", self.max_average_correlation),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "recommendation threshold {name} must be finite, got {value}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    HighVolatility,
    DeepDrawdown,
    LowSharpe,
    LargeValueAtRisk,
    HighCorrelation,
    Acceptable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

/// Portfolio figures the rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSnapshot {
    pub annual_volatility: f64,
    pub max_drawdown: f64,
    /// `None` when the portfolio ratios are undefined; the Sharpe rule is skipped.
    pub sharpe: Option<f64>,
    pub dollar_var_95: f64,
    pub notional: f64,
    /// `None` for a single asset or when a correlation is undefined.
    pub average_correlation: Option<f64>,
}

/// Apply every rule in a fixed order.
pub fn recommend(snapshot: &RiskSnapshot, thresholds: &RecommendationThresholds) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let mut push = |kind, message: String| out.push(Recommendation { kind, message });

    if snapshot.annual_volatility > thresholds.max_volatility {
        push(
            RecommendationKind::HighVolatility,
            format!(
                "annual volatility {:.1}% exceeds {:.1}%: consider reducing position sizes",
                snapshot.annual_volatility * 100.0,
                thresholds.max_volatility * 100.0
            ),
        );
    }
    if snapshot.max_drawdown.abs() > thresholds.max_drawdown {
        push(
            RecommendationKind::DeepDrawdown,
            format!(
                "max drawdown {:.1}% exceeds {:.1}%: a stop-loss policy is needed",
                snapshot.max_drawdown.abs() * 100.0,
                thresholds.max_drawdown * 100.0
            ),
        );
    }
    if let Some(sharpe) = snapshot.sharpe {
        if sharpe < thresholds.min_sharpe {
            push(
                RecommendationKind::LowSharpe,
                format!(
                    "Sharpe ratio {sharpe:.2} below {:.2}: re-optimize the allocation",
                    thresholds.min_sharpe
                ),
            );
        }
    }
    let var_limit = snapshot.notional * thresholds.max_var_fraction;
    if snapshot.dollar_var_95.abs() > var_limit {
        push(
            RecommendationKind::LargeValueAtRisk,
            format!(
                "95% VaR of ${:.0} exceeds {:.1}% of notional (${:.0}): diversify further",
                snapshot.dollar_var_95.abs(),
                thresholds.max_var_fraction * 100.0,
                var_limit
            ),
        );
    }
    if let Some(corr) = snapshot.average_correlation {
        if corr > thresholds.max_average_correlation {
            push(
                RecommendationKind::HighCorrelation,
                format!(
                    "average correlation {corr:.2} exceeds {:.2}: diversify into other asset classes",
                    thresholds.max_average_correlation
                ),
            );
        }
    }

    if out.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::Acceptable,
            message: "portfolio risk profile is within all thresholds".into(),
        });
    }
    out
}
