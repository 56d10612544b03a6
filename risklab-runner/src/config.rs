//! Serializable analysis configuration.
//!
//! Loaded from TOML. Every field has a default, so a file only needs the
//! settings it changes (usually just `symbols`).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use risklab_core::optimize::SolverError;
use risklab_core::{SolverConfig, StressScenario};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommendations::RecommendationThresholds;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid solver settings: {0}")]
    Solver(#[from] SolverError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which weight vector the portfolio risk report, stress table and
/// recommendations are computed for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortfolioWeighting {
    /// 1/N across the configured symbols.
    #[default]
    EqualWeight,
    /// Weights of the solved max-Sharpe portfolio.
    MaxSharpe,
    /// Weights of the solved min-volatility portfolio.
    MinVolatility,
    /// Explicit weights; every symbol must be listed.
    Custom { weights: BTreeMap<String, f64> },
}

impl PortfolioWeighting {
    pub fn label(&self) -> &'static str {
        match self {
            Self::EqualWeight => "equal_weight",
            Self::MaxSharpe => "max_sharpe",
            Self::MinVolatility => "min_volatility",
            Self::Custom { .. } => "custom",
        }
    }
}

/// Complete configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Assets to analyze, in report order.
    pub symbols: Vec<String>,
    /// Directory holding `<SYMBOL>.csv` price tables.
    pub data_dir: PathBuf,
    /// Market series for beta; aligned with the assets but not optimized.
    pub benchmark: Option<String>,
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
    /// Monte Carlo portfolios to sample.
    pub portfolio_samples: usize,
    /// Draws for Monte Carlo VaR.
    pub var_simulations: usize,
    pub frontier_points: usize,
    /// Portfolio value for dollar VaR and stress losses.
    pub notional: f64,
    /// Master seed for every random stream.
    pub seed: u64,
    /// Extra target-return optimizations reported alongside the standard modes.
    pub target_returns: Vec<f64>,
    pub weighting: PortfolioWeighting,
    pub stress_scenarios: Vec<StressScenario>,
    pub solver: SolverConfig,
    pub thresholds: RecommendationThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            data_dir: PathBuf::from("data"),
            benchmark: None,
            risk_free_rate: 0.02,
            periods_per_year: 252,
            portfolio_samples: 10_000,
            var_simulations: 10_000,
            frontier_points: 100,
            notional: 100_000.0,
            seed: 42,
            target_returns: Vec::new(),
            weighting: PortfolioWeighting::EqualWeight,
            stress_scenarios: StressScenario::standard_set(),
            solver: SolverConfig::default(),
            thresholds: RecommendationThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Default settings for the given symbols.
    pub fn for_symbols<S: Into<String>>(symbols: impl IntoIterator<Item = S>) -> Self {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Deterministic identifier: BLAKE3 of the canonical JSON form.
    ///
    /// Two runs with identical settings share a run id.
    pub fn run_id(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return invalid("at least one symbol is required");
        }
        let mut seen = HashSet::new();
        for s in &self.symbols {
            if s.trim().is_empty() {
                return invalid("symbols must not be blank");
            }
            if !seen.insert(s.as_str()) {
                return invalid(format!("duplicate symbol '{s}'"));
            }
        }
        if let Some(b) = &self.benchmark {
            if b.trim().is_empty() {
                return invalid("benchmark must not be blank");
            }
        }
        if !self.risk_free_rate.is_finite() {
            return invalid(format!("risk_free_rate must be finite, got {}", self.risk_free_rate));
        }
        if self.periods_per_year == 0 {
            return invalid("periods_per_year must be positive");
        }
        if self.portfolio_samples == 0 || self.var_simulations == 0 {
            return invalid("portfolio_samples and var_simulations must be positive");
        }
        if self.frontier_points == 0 {
            return invalid("frontier_points must be positive");
        }
        if !(self.notional.is_finite() && self.notional > 0.0) {
            return invalid(format!("notional must be positive, got {}", self.notional));
        }
        if let Some(t) = self.target_returns.iter().find(|t| !t.is_finite()) {
            return invalid(format!("target return {t} is not finite"));
        }

        let mut names = HashSet::new();
        for scenario in &self.stress_scenarios {
            scenario
                .validate()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if !names.insert(scenario.name()) {
                return invalid(format!("stress scenario '{}' listed twice", scenario.name()));
            }
        }

        if let PortfolioWeighting::Custom { weights } = &self.weighting {
            self.validate_custom_weights(weights)?;
        }
        self.solver.validate()?;
        self.thresholds.validate()
    }

    fn validate_custom_weights(&self, weights: &BTreeMap<String, f64>) -> Result<(), ConfigError> {
        if let Some(extra) = weights.keys().find(|k| !self.symbols.contains(k)) {
            return invalid(format!("custom weight for unknown symbol '{extra}'"));
        }
        for s in &self.symbols {
            match weights.get(s) {
                None => return invalid(format!("custom weights missing symbol '{s}'")),
                Some(w) if !(w.is_finite() && (0.0..=1.0).contains(w)) => {
                    return invalid(format!("custom weight {w} for '{s}' outside [0, 1]"));
                }
                Some(_) => {}
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return invalid(format!("custom weights sum to {sum}, expected 1"));
        }
        Ok(())
    }

    /// Custom weights in symbol order, or `None` for the other weightings.
    pub fn custom_weights(&self) -> Option<Vec<f64>> {
        match &self.weighting {
            PortfolioWeighting::Custom { weights } => Some(
                self.symbols
                    .iter()
                    .map(|s| weights.get(s).copied().unwrap_or(0.0))
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T, ConfigError> {
    Err(ConfigError::Invalid(msg.into()))
}
