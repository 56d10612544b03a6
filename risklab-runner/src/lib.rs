//! RiskLab Runner: analysis orchestration on top of `risklab-core`.
//!
//! This crate provides:
//! - TOML configuration with a deterministic run id
//! - CSV price table loading into a `ReturnSeriesStore`
//! - The end-to-end analysis pipeline and its report
//! - Rule-based risk recommendations
//! - JSON and CSV export

pub mod analysis;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod recommendations;

pub use analysis::{
    load_config_store, prepare, run_analysis, run_from_config, run_stress, solve_mode,
    Allocation, AnalysisError, AnalysisReport, AssetRisk, AssetRiskOutcome, BenchmarkBetas,
    ModeOutcome, ModeResult, MonteCarloSummary, PortfolioRisk, PreparedData, RatioOutcome,
    StressTable, SCHEMA_VERSION,
};
pub use config::{AnalysisConfig, ConfigError, PortfolioWeighting};
pub use data_loader::{load_price_series, load_store, price_path, LoadError};
pub use export::{
    export_assets_csv, export_frontier_csv, export_json, export_stress_csv, export_weights_csv,
    import_json, load_report, save_report,
};
pub use recommendations::{
    recommend, Recommendation, RecommendationKind, RecommendationThresholds, RiskSnapshot,
};
