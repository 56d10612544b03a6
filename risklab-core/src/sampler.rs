//! Monte Carlo portfolio sampling.
//!
//! Draws random long-only weight vectors (N uniform draws divided by their
//! sum) and scores each one. The normalized-uniform draw is not uniform over
//! the simplex; the cloud is an exploratory approximation with no guaranteed
//! relationship to the true efficient frontier.

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::portfolio::{evaluate, PortfolioStatistics};
use crate::rng::RngHierarchy;
use crate::stats::AnnualizedStatistics;

/// Default number of sampled portfolios.
pub const DEFAULT_PORTFOLIO_SAMPLES: usize = 10_000;

/// Portfolios per parallel chunk. Each chunk owns one RNG stream.
const CHUNK_SIZE: usize = 512;

/// One sampled weight vector and its statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSample {
    pub weights: Vec<f64>,
    pub statistics: PortfolioStatistics,
}

/// The full cloud of sampled portfolios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioCloud {
    pub symbols: Vec<String>,
    pub samples: Vec<PortfolioSample>,
}

impl PortfolioCloud {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn best_sharpe(&self) -> Option<&PortfolioSample> {
        self.samples.iter().max_by(|a, b| {
            a.statistics
                .sharpe_ratio
                .partial_cmp(&b.statistics.sharpe_ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    pub fn min_volatility(&self) -> Option<&PortfolioSample> {
        self.samples.iter().min_by(|a, b| {
            a.statistics
                .volatility
                .partial_cmp(&b.statistics.volatility)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Samples random feasible portfolios.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloSampler {
    samples: usize,
}

impl Default for MonteCarloSampler {
    fn default() -> Self {
        Self::new(DEFAULT_PORTFOLIO_SAMPLES)
    }
}

impl MonteCarloSampler {
    pub fn new(samples: usize) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Draw and score `samples` portfolios from the given generator.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        stats: &AnnualizedStatistics,
        risk_free_rate: f64,
        rng: &mut R,
    ) -> Result<PortfolioCloud> {
        check_assets(stats)?;
        let samples = draw(stats, risk_free_rate, self.samples, rng)?;
        Ok(PortfolioCloud {
            symbols: stats.symbols.clone(),
            samples,
        })
    }

    /// Parallel sampling: chunk `i` draws from `rngs.rng_for("weights", i)`, so
    /// the cloud depends only on the master seed, not on the thread count.
    pub fn sample_parallel(
        &self,
        stats: &AnnualizedStatistics,
        risk_free_rate: f64,
        rngs: &RngHierarchy,
    ) -> Result<PortfolioCloud> {
        check_assets(stats)?;
        let chunks = self.samples.div_ceil(CHUNK_SIZE);
        let per_chunk: Vec<Vec<PortfolioSample>> = (0..chunks)
            .into_par_iter()
            .map(|chunk| {
                let count = CHUNK_SIZE.min(self.samples - chunk * CHUNK_SIZE);
                let mut rng: StdRng = rngs.rng_for("weights", chunk as u64);
                draw(stats, risk_free_rate, count, &mut rng)
            })
            .collect::<Result<_>>()?;
        Ok(PortfolioCloud {
            symbols: stats.symbols.clone(),
            samples: per_chunk.into_iter().flatten().collect(),
        })
    }
}

fn check_assets(stats: &AnnualizedStatistics) -> Result<()> {
    if stats.n_assets() == 0 {
        return Err(EngineError::insufficient("sampler assets", 1, 0));
    }
    Ok(())
}

fn draw<R: Rng + ?Sized>(
    stats: &AnnualizedStatistics,
    risk_free_rate: f64,
    count: usize,
    rng: &mut R,
) -> Result<Vec<PortfolioSample>> {
    let n = stats.n_assets();
    (0..count)
        .map(|_| {
            let weights = random_weights(n, rng);
            let statistics = evaluate(&weights, &stats.mean, &stats.covariance, risk_free_rate)?;
            Ok(PortfolioSample {
                weights,
                statistics,
            })
        })
        .collect()
}

/// N uniform(0, 1) draws normalized to sum to one.
pub fn random_weights<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    loop {
        let raw: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            return raw.into_iter().map(|w| w / total).collect();
        }
    }
}
