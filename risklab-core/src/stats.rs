//! Joint return statistics: annualized mean vector, covariance and correlation.
//!
//! Daily means and sample covariances (denominator T-1) are scaled linearly by
//! the number of periods per year, matching the square-root-of-time
//! convention used by every volatility figure in the engine.

use serde::{Deserialize, Serialize};

use crate::data::ReturnMatrix;
use crate::error::{EngineError, Result};

/// Default number of return periods per year.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// Variance below this is treated as zero.
pub(crate) const ZERO_VARIANCE: f64 = 1e-30;

/// Symmetric N×N covariance matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    rows: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    /// Wrap a square, symmetric matrix of finite values.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(EngineError::insufficient("covariance matrix assets", 1, 0));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(EngineError::invalid(format!(
                    "covariance row {i} has {} entries, expected {n}",
                    row.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::invalid(format!(
                    "covariance row {i} contains a non-finite value"
                )));
            }
        }
        for i in 0..n {
            if rows[i][i] < 0.0 {
                return Err(EngineError::invalid(format!(
                    "negative variance {} on the diagonal",
                    rows[i][i]
                )));
            }
            for j in (i + 1)..n {
                let (a, b) = (rows[i][j], rows[j][i]);
                if (a - b).abs() > 1e-12 * (1.0 + a.abs().max(b.abs())) {
                    return Err(EngineError::invalid(format!(
                        "covariance is not symmetric at ({i}, {j})"
                    )));
                }
            }
        }
        Ok(Self { rows })
    }

    /// Diagonal covariance (uncorrelated assets).
    pub fn diagonal(variances: &[f64]) -> Result<Self> {
        let n = variances.len();
        let rows = (0..n)
            .map(|i| {
                let mut row = vec![0.0; n];
                row[i] = variances[i];
                row
            })
            .collect();
        Self::new(rows)
    }

    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.rows[i][j]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn variance(&self, i: usize) -> f64 {
        self.rows[i][i]
    }

    /// Σw
    pub fn mul_vec(&self, w: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().zip(w).map(|(c, x)| c * x).sum())
            .collect()
    }

    /// wᵀΣw
    pub fn quad_form(&self, w: &[f64]) -> f64 {
        self.mul_vec(w).iter().zip(w).map(|(a, b)| a * b).sum()
    }

    /// Pearson correlation matrix.
    ///
    /// Fails with `DegenerateVolatility` if any asset has zero variance.
    pub fn correlation(&self) -> Result<Vec<Vec<f64>>> {
        let n = self.dim();
        let std: Vec<f64> = (0..n).map(|i| self.variance(i).sqrt()).collect();
        if std.iter().any(|s| s * s <= ZERO_VARIANCE) {
            return Err(EngineError::DegenerateVolatility {
                context: "correlation matrix",
            });
        }
        Ok((0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            1.0
                        } else {
                            (self.rows[i][j] / (std[i] * std[j])).clamp(-1.0, 1.0)
                        }
                    })
                    .collect()
            })
            .collect())
    }
}

/// Annualized statistics for an aligned set of assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualizedStatistics {
    pub symbols: Vec<String>,
    pub mean: Vec<f64>,
    pub covariance: CovarianceMatrix,
}

/// Stand-alone figures for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub symbol: String,
    pub annual_return: f64,
    pub annual_volatility: f64,
    /// `None` when the asset's volatility is zero.
    pub sharpe: Option<f64>,
}

impl AnnualizedStatistics {
    /// Assemble statistics from explicit inputs, checking dimensions.
    pub fn new(symbols: Vec<String>, mean: Vec<f64>, covariance: CovarianceMatrix) -> Result<Self> {
        if symbols.len() != mean.len() || mean.len() != covariance.dim() {
            return Err(EngineError::invalid(format!(
                "{} symbols, {} means, {}x{} covariance",
                symbols.len(),
                mean.len(),
                covariance.dim(),
                covariance.dim()
            )));
        }
        if mean.iter().any(|m| !m.is_finite()) {
            return Err(EngineError::invalid("non-finite mean return"));
        }
        Ok(Self {
            symbols,
            mean,
            covariance,
        })
    }

    pub fn n_assets(&self) -> usize {
        self.mean.len()
    }

    pub fn min_mean(&self) -> f64 {
        self.mean.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_mean(&self) -> f64 {
        self.mean.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn correlation(&self) -> Result<Vec<Vec<f64>>> {
        self.covariance.correlation()
    }

    /// Mean of the strictly upper-triangular pairwise correlations.
    pub fn average_correlation(&self) -> Result<f64> {
        let n = self.n_assets();
        if n < 2 {
            return Err(EngineError::insufficient("average correlation assets", 2, n));
        }
        let corr = self.correlation()?;
        let mut sum = 0.0;
        let mut count = 0usize;
        for i in 0..n {
            for j in (i + 1)..n {
                sum += corr[i][j];
                count += 1;
            }
        }
        Ok(sum / count as f64)
    }

    /// Per-asset annual return, volatility and Sharpe ratio.
    pub fn asset_statistics(&self, risk_free_rate: f64) -> Vec<AssetStatistics> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| {
                let var = self.covariance.variance(i);
                let vol = var.sqrt();
                AssetStatistics {
                    symbol: symbol.clone(),
                    annual_return: self.mean[i],
                    annual_volatility: vol,
                    sharpe: (var > ZERO_VARIANCE).then(|| (self.mean[i] - risk_free_rate) / vol),
                }
            })
            .collect()
    }
}

/// Estimates annualized mean and covariance from an aligned return matrix.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsEstimator {
    periods_per_year: f64,
}

impl Default for StatisticsEstimator {
    fn default() -> Self {
        Self::new(TRADING_DAYS_PER_YEAR)
    }
}

impl StatisticsEstimator {
    pub fn new(periods_per_year: u32) -> Self {
        Self {
            periods_per_year: periods_per_year as f64,
        }
    }

    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Annualized mean vector and sample covariance matrix.
    ///
    /// Requires at least two aligned observations.
    pub fn estimate(&self, matrix: &ReturnMatrix) -> Result<AnnualizedStatistics> {
        let t = matrix.n_observations();
        if t < 2 {
            return Err(EngineError::insufficient("covariance estimation", 2, t));
        }
        let columns = matrix.columns();
        let means: Vec<f64> = columns.iter().map(|c| mean(c)).collect();

        let n = columns.len();
        let mut rows = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in i..n {
                let cov = covariance_with_means(&columns[i], means[i], &columns[j], means[j])
                    * self.periods_per_year;
                rows[i][j] = cov;
                rows[j][i] = cov;
            }
        }

        AnnualizedStatistics::new(
            matrix.symbols().to_vec(),
            means.iter().map(|m| m * self.periods_per_year).collect(),
            CovarianceMatrix::new(rows)?,
        )
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (denominator n-1). Zero for fewer than two values.
pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Sample covariance (denominator n-1) of two equal-length series.
pub(crate) fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    covariance_with_means(a, mean(a), b, mean(b))
}

fn covariance_with_means(a: &[f64], mean_a: f64, b: &[f64], mean_b: f64) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}
