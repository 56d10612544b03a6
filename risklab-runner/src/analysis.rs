//! Analysis pipeline: wires the engine stages into one report.
//!
//! Stages, in order:
//! 1. align the requested symbols (plus the benchmark when configured)
//! 2. annualized statistics, correlation and betas
//! 3. equal-weight figures and every optimization mode
//! 4. efficient frontier and Monte Carlo cloud
//! 5. portfolio risk for the configured weighting
//! 6. per-asset risk
//! 7. stress table
//! 8. recommendations
//!
//! A failed optimization mode, asset report or portfolio ratio section is
//! recorded with its reason and the run continues. Errors in shared inputs
//! (alignment, statistics) abort.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use risklab_core::optimize::{ProjectedLagrangianSolver, Solver};
use risklab_core::portfolio::equal_weights;
use risklab_core::risk::beta;
use risklab_core::stats::AssetStatistics;
use risklab_core::{
    AnnualizedStatistics, EfficientFrontier, EfficientFrontierBuilder, EngineError,
    MonteCarloSampler, OptimizationMode, Optimizer, PortfolioEvaluator, PortfolioSample,
    PortfolioStatistics, ReturnMatrix, ReturnSeriesStore, RiskMetricsEngine, RiskRatios,
    RiskReport, RngHierarchy, StatisticsEstimator, StressResult, StressTester, TailRisk,
    VarEstimates,
};

use crate::config::{AnalysisConfig, ConfigError, PortfolioWeighting};
use crate::data_loader::{load_store, LoadError};
use crate::recommendations::{recommend, Recommendation, RiskSnapshot};

/// Current schema version for exported reports.
pub const SCHEMA_VERSION: u32 = 2;

/// Errors from the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("portfolio weighting '{weighting}' unavailable: {reason}")]
    WeightingUnavailable {
        weighting: &'static str,
        reason: String,
    },
}

// ─── Report types ───────────────────────────────────────────────────

/// Weights keyed by symbol with their statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub weights: BTreeMap<String, f64>,
    pub statistics: PortfolioStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModeResult {
    Solved {
        allocation: Allocation,
        iterations: usize,
    },
    Failed {
        reason: String,
    },
}

/// Outcome of one optimization mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeOutcome {
    pub mode: OptimizationMode,
    pub label: String,
    pub result: ModeResult,
}

impl ModeOutcome {
    pub fn allocation(&self) -> Option<&Allocation> {
        match &self.result {
            ModeResult::Solved { allocation, .. } => Some(allocation),
            ModeResult::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub samples: usize,
    pub best_sharpe: Option<Allocation>,
    pub min_volatility: Option<Allocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkBetas {
    pub benchmark: String,
    pub betas: BTreeMap<String, f64>,
}

/// Sharpe, Sortino and Calmar of the portfolio series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatioOutcome {
    Reported { ratios: RiskRatios },
    Failed { reason: String },
}

impl RatioOutcome {
    pub fn ratios(&self) -> Option<&RiskRatios> {
        match self {
            RatioOutcome::Reported { ratios } => Some(ratios),
            RatioOutcome::Failed { .. } => None,
        }
    }

    pub fn sharpe(&self) -> Option<f64> {
        self.ratios().map(|r| r.sharpe)
    }
}

/// Risk of the weighted portfolio return series.
///
/// Tail figures are always present; the ratios fail on their own when the
/// series has zero volatility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRisk {
    pub weighting: String,
    pub weights: BTreeMap<String, f64>,
    pub tail: TailRisk,
    pub ratios: RatioOutcome,
    pub var_95: VarEstimates,
    pub var_99: VarEstimates,
    pub dollar_var_95: f64,
    pub dollar_var_99: f64,
    pub dollar_cvar_95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetRisk {
    Reported { report: RiskReport },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRiskOutcome {
    pub symbol: String,
    pub risk: AssetRisk,
}

/// Stress results for one weighted portfolio, keyed by scenario name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTable {
    pub weighting: String,
    pub weights: BTreeMap<String, f64>,
    pub results: BTreeMap<String, StressResult>,
}

/// Complete result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub observations: usize,
    pub notional: f64,
    pub asset_statistics: Vec<AssetStatistics>,
    /// `None` when an asset has zero variance.
    pub correlation: Option<Vec<Vec<f64>>>,
    /// `None` for a single asset or an undefined correlation.
    pub average_correlation: Option<f64>,
    pub benchmark: Option<BenchmarkBetas>,
    /// `None` when the equal-weight portfolio has zero volatility.
    pub equal_weight: Option<PortfolioStatistics>,
    pub optimizations: Vec<ModeOutcome>,
    pub frontier: EfficientFrontier,
    pub monte_carlo: MonteCarloSummary,
    pub portfolio: PortfolioRisk,
    pub asset_risk: Vec<AssetRiskOutcome>,
    pub stress: BTreeMap<String, StressResult>,
    pub recommendations: Vec<Recommendation>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl AnalysisReport {
    pub fn mode(&self, mode: &str) -> Option<&ModeOutcome> {
        self.optimizations.iter().find(|m| m.label == mode)
    }
}

// ─── Shared inputs ──────────────────────────────────────────────────

/// Aligned returns and statistics for the configured symbols.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Requested symbols plus the benchmark, if any.
    pub aligned: ReturnMatrix,
    /// Requested symbols only, in config order.
    pub matrix: ReturnMatrix,
    pub stats: AnnualizedStatistics,
}

impl PreparedData {
    pub fn optimizer<'a>(
        &'a self,
        config: &AnalysisConfig,
    ) -> Optimizer<'a, ProjectedLagrangianSolver> {
        Optimizer::with_solver(
            &self.stats,
            config.risk_free_rate,
            ProjectedLagrangianSolver::new(config.solver.clone()),
        )
    }
}

/// Align the configured symbols and estimate their statistics.
pub fn prepare(config: &AnalysisConfig, store: &ReturnSeriesStore) -> Result<PreparedData, AnalysisError> {
    config.validate()?;
    let mut requested = config.symbols.clone();
    if let Some(b) = &config.benchmark {
        if !requested.contains(b) {
            requested.push(b.clone());
        }
    }
    let aligned = store.align(&requested)?;
    let matrix = aligned.select(&config.symbols)?;
    let stats = StatisticsEstimator::new(config.periods_per_year).estimate(&matrix)?;
    info!(
        assets = matrix.n_assets(),
        observations = matrix.n_observations(),
        "returns aligned"
    );
    Ok(PreparedData {
        aligned,
        matrix,
        stats,
    })
}

/// Load price tables from `config.data_dir` and run the full analysis.
pub fn run_from_config(config: &AnalysisConfig) -> Result<AnalysisReport, AnalysisError> {
    let store = load_config_store(config)?;
    run_analysis(config, &store)
}

/// Load every configured symbol (and the benchmark) from `config.data_dir`.
pub fn load_config_store(config: &AnalysisConfig) -> Result<ReturnSeriesStore, AnalysisError> {
    let mut symbols = config.symbols.clone();
    if let Some(b) = &config.benchmark {
        if !symbols.contains(b) {
            symbols.push(b.clone());
        }
    }
    Ok(load_store(&config.data_dir, &symbols)?)
}

// ─── Pipeline ───────────────────────────────────────────────────────

/// Run every stage against an already loaded store.
pub fn run_analysis(
    config: &AnalysisConfig,
    store: &ReturnSeriesStore,
) -> Result<AnalysisReport, AnalysisError> {
    let run_id = config.run_id()?;
    let short_id = &run_id[..12];
    info!(run_id = short_id, symbols = ?config.symbols, "starting analysis");

    let data = prepare(config, store)?;
    let (matrix, stats) = (&data.matrix, &data.stats);
    let rf = config.risk_free_rate;
    let rngs = RngHierarchy::new(config.seed);
    let (start_date, end_date) = date_range(matrix)?;

    // Statistics
    let correlation = match stats.correlation() {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(error = %e, "correlation matrix undefined");
            None
        }
    };
    let average_correlation = if correlation.is_some() && stats.n_assets() >= 2 {
        Some(stats.average_correlation()?)
    } else {
        None
    };
    let benchmark = benchmark_betas(config, &data)?;

    // Optimization
    let equal_weight = match PortfolioEvaluator::new(stats, rf).equal_weight() {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "equal-weight portfolio undefined");
            None
        }
    };
    let optimizer = data.optimizer(config);
    let mut modes = vec![OptimizationMode::MaxSharpe, OptimizationMode::MinVolatility];
    modes.extend(
        config
            .target_returns
            .iter()
            .map(|&target| OptimizationMode::TargetReturn { target }),
    );
    let optimizations: Vec<ModeOutcome> = modes
        .into_iter()
        .map(|mode| solve_mode(&optimizer, mode))
        .collect();
    info!(
        solved = optimizations.iter().filter(|m| m.allocation().is_some()).count(),
        total = optimizations.len(),
        "optimization modes finished"
    );

    let frontier = EfficientFrontierBuilder::new(config.frontier_points).build_parallel(&optimizer)?;
    info!(
        points = frontier.len(),
        failed = frontier.failed_count(),
        "efficient frontier built"
    );

    let cloud = MonteCarloSampler::new(config.portfolio_samples).sample_parallel(stats, rf, &rngs)?;
    let monte_carlo = MonteCarloSummary {
        samples: cloud.len(),
        best_sharpe: cloud.best_sharpe().map(|s| sample_allocation(&stats.symbols, s)),
        min_volatility: cloud
            .min_volatility()
            .map(|s| sample_allocation(&stats.symbols, s)),
    };

    // Portfolio risk
    let weights = resolve_weights(config, &optimizations)?;
    let returns = matrix.portfolio_returns(&weights)?;
    let engine = RiskMetricsEngine::new(rf, config.periods_per_year, config.var_simulations);
    let tail = engine.tail_risk(&returns)?;
    let ratios = portfolio_ratios(&engine, &returns)?;
    let portfolio = PortfolioRisk {
        weighting: config.weighting.label().to_string(),
        weights: keyed(&config.symbols, &weights),
        var_95: engine.var_estimates(&returns, 0.95, &mut rngs.rng_for("var", 95))?,
        var_99: engine.var_estimates(&returns, 0.99, &mut rngs.rng_for("var", 99))?,
        dollar_var_95: tail.var_95 * config.notional,
        dollar_var_99: tail.var_99 * config.notional,
        dollar_cvar_95: tail.cvar_95 * config.notional,
        tail,
        ratios,
    };
    info!(
        weighting = %portfolio.weighting,
        var_95 = portfolio.tail.var_95,
        sharpe = ?portfolio.ratios.sharpe(),
        "portfolio risk computed"
    );

    let asset_risk = asset_reports(&engine, matrix);

    let stress = StressTester::new(config.notional)?
        .run(
            &returns,
            &config.stress_scenarios,
            &mut rngs.rng_for("stress", 0),
        )?
        .into_iter()
        .map(|r| (r.name().to_string(), r))
        .collect();

    let recommendations = recommend(
        &RiskSnapshot {
            annual_volatility: portfolio.tail.annual_volatility,
            max_drawdown: portfolio.tail.max_drawdown,
            sharpe: portfolio.ratios.sharpe(),
            dollar_var_95: portfolio.dollar_var_95,
            notional: config.notional,
            average_correlation,
        },
        &config.thresholds,
    );
    info!(recommendations = recommendations.len(), "analysis complete");

    Ok(AnalysisReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        symbols: config.symbols.clone(),
        start_date,
        end_date,
        observations: matrix.n_observations(),
        notional: config.notional,
        asset_statistics: stats.asset_statistics(rf),
        correlation,
        average_correlation,
        benchmark,
        equal_weight,
        optimizations,
        frontier,
        monte_carlo,
        portfolio,
        asset_risk,
        stress,
        recommendations,
    })
}

/// Stress the configured portfolio without the rest of the pipeline.
///
/// Only the optimization mode named by the weighting, if any, is solved.
pub fn run_stress(config: &AnalysisConfig, store: &ReturnSeriesStore) -> Result<StressTable, AnalysisError> {
    let data = prepare(config, store)?;
    let optimizer = data.optimizer(config);
    let solved: Vec<ModeOutcome> = match config.weighting {
        PortfolioWeighting::MaxSharpe => vec![solve_mode(&optimizer, OptimizationMode::MaxSharpe)],
        PortfolioWeighting::MinVolatility => {
            vec![solve_mode(&optimizer, OptimizationMode::MinVolatility)]
        }
        _ => Vec::new(),
    };
    let weights = resolve_weights(config, &solved)?;
    let returns = data.matrix.portfolio_returns(&weights)?;
    let rngs = RngHierarchy::new(config.seed);
    let results = StressTester::new(config.notional)?
        .run(
            &returns,
            &config.stress_scenarios,
            &mut rngs.rng_for("stress", 0),
        )?
        .into_iter()
        .map(|r| (r.name().to_string(), r))
        .collect();
    Ok(StressTable {
        weighting: config.weighting.label().to_string(),
        weights: keyed(&config.symbols, &weights),
        results,
    })
}

// ─── Stage helpers ──────────────────────────────────────────────────

/// Solve one mode, recording a failure instead of returning it.
pub fn solve_mode<S: Solver>(
    optimizer: &Optimizer<'_, S>,
    mode: OptimizationMode,
) -> ModeOutcome {
    let result = match optimizer.optimize(mode) {
        Ok(p) => ModeResult::Solved {
            allocation: Allocation {
                weights: keyed(&p.symbols, &p.weights),
                statistics: p.statistics,
            },
            iterations: p.iterations,
        },
        Err(e) => {
            warn!(%mode, error = %e, "optimization mode failed");
            ModeResult::Failed {
                reason: e.to_string(),
            }
        }
    };
    ModeOutcome {
        mode,
        label: mode.to_string(),
        result,
    }
}

fn resolve_weights(
    config: &AnalysisConfig,
    solved: &[ModeOutcome],
) -> Result<Vec<f64>, AnalysisError> {
    let from_mode = |wanted: OptimizationMode| -> Result<Vec<f64>, AnalysisError> {
        let weighting = config.weighting.label();
        let outcome = solved.iter().find(|m| m.mode == wanted).ok_or_else(|| {
            AnalysisError::WeightingUnavailable {
                weighting,
                reason: format!("{wanted} was not solved"),
            }
        })?;
        match &outcome.result {
            ModeResult::Solved { allocation, .. } => Ok(config
                .symbols
                .iter()
                .map(|s| allocation.weights.get(s).copied().unwrap_or(0.0))
                .collect()),
            ModeResult::Failed { reason } => Err(AnalysisError::WeightingUnavailable {
                weighting,
                reason: reason.clone(),
            }),
        }
    };

    match &config.weighting {
        PortfolioWeighting::EqualWeight => Ok(equal_weights(config.symbols.len())),
        PortfolioWeighting::MaxSharpe => from_mode(OptimizationMode::MaxSharpe),
        PortfolioWeighting::MinVolatility => from_mode(OptimizationMode::MinVolatility),
        PortfolioWeighting::Custom { .. } => {
            config
                .custom_weights()
                .ok_or_else(|| AnalysisError::WeightingUnavailable {
                    weighting: "custom",
                    reason: "no custom weights configured".into(),
                })
        }
    }
}

fn benchmark_betas(
    config: &AnalysisConfig,
    data: &PreparedData,
) -> Result<Option<BenchmarkBetas>, AnalysisError> {
    let Some(benchmark) = &config.benchmark else {
        return Ok(None);
    };
    let market = data.aligned.column_by_symbol(benchmark)?;
    let betas = config
        .symbols
        .iter()
        .map(|s| Ok((s.clone(), beta(data.matrix.column_by_symbol(s)?, market)?)))
        .collect::<Result<BTreeMap<String, f64>, EngineError>>()?;
    Ok(Some(BenchmarkBetas {
        benchmark: benchmark.clone(),
        betas,
    }))
}

/// Only a zero-volatility series is recorded as a failed section; any other
/// error aborts like the tail figures do.
fn portfolio_ratios(
    engine: &RiskMetricsEngine,
    returns: &[f64],
) -> Result<RatioOutcome, EngineError> {
    match engine.ratios(returns) {
        Ok(ratios) => Ok(RatioOutcome::Reported { ratios }),
        Err(e @ EngineError::DegenerateVolatility { .. }) => {
            warn!(error = %e, "portfolio ratios undefined");
            Ok(RatioOutcome::Failed {
                reason: e.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

fn asset_reports(engine: &RiskMetricsEngine, matrix: &ReturnMatrix) -> Vec<AssetRiskOutcome> {
    matrix
        .symbols()
        .par_iter()
        .zip(matrix.columns().par_iter())
        .map(|(symbol, column)| {
            let risk = match engine.report(column) {
                Ok(report) => AssetRisk::Reported { report },
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "asset risk report failed");
                    AssetRisk::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            AssetRiskOutcome {
                symbol: symbol.clone(),
                risk,
            }
        })
        .collect()
}

fn sample_allocation(symbols: &[String], sample: &PortfolioSample) -> Allocation {
    Allocation {
        weights: keyed(symbols, &sample.weights),
        statistics: sample.statistics,
    }
}

fn keyed(symbols: &[String], weights: &[f64]) -> BTreeMap<String, f64> {
    symbols.iter().cloned().zip(weights.iter().copied()).collect()
}

fn date_range(matrix: &ReturnMatrix) -> Result<(NaiveDate, NaiveDate), EngineError> {
    match (matrix.dates().first(), matrix.dates().last()) {
        (Some(start), Some(end)) => Ok((*start, *end)),
        _ => Err(EngineError::InsufficientData {
            context: "aligned observations",
            required: 1,
            actual: 0,
        }),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use risklab_core::AssetReturnSeries;

    /// Three assets with distinct, deterministic return patterns.
    pub(crate) fn store() -> ReturnSeriesStore {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let make = |symbol: &str, scale: f64, drift: f64, phase: f64| {
            let pairs: Vec<(NaiveDate, f64)> = (0..120)
                .map(|i| {
                    let r = drift + scale * ((i as f64) * 0.9 + phase).sin();
                    (start + chrono::Duration::days(i as i64), r)
                })
                .collect();
            AssetReturnSeries::from_pairs(symbol, &pairs).unwrap()
        };
        [
            make("AAA", 0.012, 0.0006, 0.0),
            make("BBB", 0.006, 0.0003, 1.3),
            make("CCC", 0.020, 0.0009, 2.1),
        ]
        .into_iter()
        .collect()
    }

    pub(crate) fn config() -> AnalysisConfig {
        AnalysisConfig {
            portfolio_samples: 300,
            var_simulations: 2_000,
            frontier_points: 8,
            ..AnalysisConfig::for_symbols(["AAA", "BBB", "CCC"])
        }
    }

    pub(crate) fn report() -> AnalysisReport {
        run_analysis(&config(), &store()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{config, store};
    use super::*;
    use risklab_core::StressScenario;

    #[test]
    fn report_covers_every_stage() {
        let report = run_analysis(&config(), &store()).unwrap();
        assert_eq!(report.symbols, ["AAA", "BBB", "CCC"]);
        assert_eq!(report.observations, 120);
        assert_eq!(report.asset_statistics.len(), 3);
        assert!(report.average_correlation.is_some());
        assert_eq!(report.optimizations.len(), 2);
        assert!(report.mode("max_sharpe").unwrap().allocation().is_some());
        assert!(report.mode("min_volatility").unwrap().allocation().is_some());
        assert_eq!(report.frontier.len(), 8);
        assert_eq!(report.monte_carlo.samples, 300);
        assert_eq!(report.asset_risk.len(), 3);
        assert_eq!(report.stress.len(), 4);
        assert!(!report.recommendations.is_empty());
        assert_eq!(report.portfolio.weighting, "equal_weight");
    }

    #[test]
    fn dollar_var_scales_with_notional() {
        let report = run_analysis(&config(), &store()).unwrap();
        let p = &report.portfolio;
        assert!((p.dollar_var_95 - p.tail.var_95 * 100_000.0).abs() < 1e-9);
        assert!(p.ratios.sharpe().is_some());
        let crash = &report.stress["market_crash"];
        assert!((crash.expected_dollar_loss - crash.var_95 * 100_000.0).abs() < 1e-9);
    }

    #[test]
    fn runs_are_reproducible() {
        let a = run_analysis(&config(), &store()).unwrap();
        let b = run_analysis(&config(), &store()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn infeasible_target_is_recorded_not_fatal() {
        let config = AnalysisConfig {
            target_returns: vec![5.0],
            ..config()
        };
        let report = run_analysis(&config, &store()).unwrap();
        let target = report.optimizations.last().unwrap();
        assert!(matches!(target.result, ModeResult::Failed { .. }));
    }

    #[test]
    fn missing_symbol_aborts() {
        let config = AnalysisConfig {
            symbols: vec!["AAA".into(), "ZZZ".into()],
            ..config()
        };
        assert!(matches!(
            run_analysis(&config, &store()),
            Err(AnalysisError::Engine(EngineError::MissingAsset { .. }))
        ));
    }

    #[test]
    fn min_volatility_weighting_uses_solved_weights() {
        let config = AnalysisConfig {
            weighting: PortfolioWeighting::MinVolatility,
            ..config()
        };
        let report = run_analysis(&config, &store()).unwrap();
        let solved = report.mode("min_volatility").unwrap().allocation().unwrap();
        assert_eq!(report.portfolio.weights, solved.weights);
    }

    #[test]
    fn benchmark_betas_are_reported() {
        let config = AnalysisConfig {
            symbols: vec!["AAA".into(), "BBB".into()],
            benchmark: Some("CCC".into()),
            ..config()
        };
        let report = run_analysis(&config, &store()).unwrap();
        let betas = report.benchmark.unwrap();
        assert_eq!(betas.benchmark, "CCC");
        assert_eq!(betas.betas.len(), 2);
        assert_eq!(report.symbols.len(), 2);
    }

    #[test]
    fn flat_portfolio_reports_tail_risk_without_ratios() {
        // BBB mirrors AAA around the same drift, so the 50/50 mix never moves.
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let series = |symbol: &str, sign: f64| {
            let pairs: Vec<(NaiveDate, f64)> = (0..60)
                .map(|i| {
                    let r = 0.0005 + sign * 0.01 * ((i as f64) * 0.9).sin();
                    (start + chrono::Duration::days(i as i64), r)
                })
                .collect();
            risklab_core::AssetReturnSeries::from_pairs(symbol, &pairs).unwrap()
        };
        let store: ReturnSeriesStore = [series("AAA", 1.0), series("BBB", -1.0)]
            .into_iter()
            .collect();
        let config = AnalysisConfig {
            weighting: PortfolioWeighting::Custom {
                weights: [("AAA".to_string(), 0.5), ("BBB".to_string(), 0.5)]
                    .into_iter()
                    .collect(),
            },
            portfolio_samples: 200,
            var_simulations: 1_000,
            frontier_points: 5,
            ..AnalysisConfig::for_symbols(["AAA", "BBB"])
        };

        let report = run_analysis(&config, &store).unwrap();
        let p = &report.portfolio;
        assert!(matches!(p.ratios, RatioOutcome::Failed { .. }));
        assert!((p.tail.var_95 - 0.0005).abs() < 1e-12);
        assert_eq!(p.tail.max_drawdown, 0.0);
        assert!((p.dollar_var_95 - p.tail.var_95 * config.notional).abs() < 1e-9);
        assert!(report
            .recommendations
            .iter()
            .all(|r| r.kind != crate::RecommendationKind::LowSharpe));
        assert_eq!(report.asset_risk.len(), 2);
    }

    #[test]
    fn stress_only_run_matches_full_report() {
        let config = AnalysisConfig {
            stress_scenarios: vec![StressScenario::market_crash(), StressScenario::recession()],
            ..config()
        };
        let full = run_analysis(&config, &store()).unwrap();
        let table = run_stress(&config, &store()).unwrap();
        assert_eq!(table.results, full.stress);
        assert_eq!(table.weights, full.portfolio.weights);
    }
}
