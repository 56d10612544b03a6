//! RiskLab Core: return alignment, statistics, portfolio optimization and risk.
//!
//! This crate contains the engine:
//! - Return series, the aligned return matrix and the series store
//! - Annualized mean / covariance / correlation estimation
//! - Portfolio evaluation (return, volatility, Sharpe)
//! - Constrained optimization behind the `Solver` trait, and the efficient frontier
//! - Monte Carlo portfolio sampling
//! - VaR / CVaR / drawdown / ratio metrics and stress scenarios
//!
//! Everything is synchronous and performs no I/O. Randomness is always passed
//! in, either as an explicit `Rng` or through `RngHierarchy`.

pub mod data;
pub mod error;
pub mod frontier;
pub mod optimize;
pub mod portfolio;
pub mod risk;
pub mod rng;
pub mod sampler;
pub mod stats;
pub mod stress;

pub use data::{align_series, AssetReturnSeries, ReturnMatrix, ReturnObservation, ReturnSeriesStore};
pub use error::{EngineError, Result};
pub use frontier::{EfficientFrontier, EfficientFrontierBuilder, FrontierOutcome, FrontierPoint};
pub use optimize::{OptimizationMode, OptimizedPortfolio, Optimizer, SolverConfig, SolverError};
pub use portfolio::{PortfolioEvaluator, PortfolioStatistics};
pub use risk::{RiskMetricsEngine, RiskRatios, RiskReport, TailRisk, VarEstimates};
pub use rng::RngHierarchy;
pub use sampler::{MonteCarloSampler, PortfolioCloud, PortfolioSample};
pub use stats::{AnnualizedStatistics, AssetStatistics, CovarianceMatrix, StatisticsEstimator};
pub use stress::{StressResult, StressScenario, StressTester};
