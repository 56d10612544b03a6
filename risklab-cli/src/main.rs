//! RiskLab CLI: portfolio analysis, optimization, frontier and stress commands.
//!
//! Commands:
//! - `analyze`: full pipeline from a TOML config, artifacts saved to disk
//! - `optimize`: solve one optimization mode
//! - `frontier`: sweep the efficient frontier, optionally to CSV
//! - `stress`: stress table for the configured portfolio weighting
//! - `init-config`: write a default config file

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use risklab_core::{EfficientFrontier, EfficientFrontierBuilder, OptimizationMode, OptimizedPortfolio};
use risklab_runner::{
    export_frontier_csv, load_config_store, prepare, run_from_config, run_stress, save_report,
    AnalysisConfig, AnalysisReport, AssetRisk, ModeResult, RatioOutcome, StressTable,
};

#[derive(Parser)]
#[command(
    name = "risklab",
    about = "RiskLab CLI: portfolio risk and optimization engine"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and save JSON/CSV artifacts.
    Analyze {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Solve one optimization mode.
    Optimize {
        #[arg(long)]
        config: PathBuf,

        #[arg(long, value_enum)]
        mode: ModeArg,

        /// Annual target return (required with --mode target-return).
        #[arg(long)]
        target: Option<f64>,

        /// Print the solved portfolio as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Sweep the efficient frontier.
    Frontier {
        #[arg(long)]
        config: PathBuf,

        /// Number of target returns. Defaults to the config value.
        #[arg(long)]
        points: Option<usize>,

        /// Write the frontier as CSV to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Stress the configured portfolio.
    Stress {
        #[arg(long)]
        config: PathBuf,
    },
    /// Write a default config file.
    InitConfig {
        #[arg(long, default_value = "risklab.toml")]
        output: PathBuf,

        /// Symbols to list in the config.
        #[arg(long, num_args = 1.., default_values = ["SPY", "AGG", "GLD"])]
        symbols: Vec<String>,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    MaxSharpe,
    MinVolatility,
    TargetReturn,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze { config, output_dir } => run_analyze_cmd(&config, &output_dir),
        Commands::Optimize {
            config,
            mode,
            target,
            json,
        } => run_optimize_cmd(&config, mode, target, json),
        Commands::Frontier {
            config,
            points,
            output,
        } => run_frontier_cmd(&config, points, output.as_deref()),
        Commands::Stress { config } => run_stress_cmd(&config),
        Commands::InitConfig {
            output,
            symbols,
            force,
        } => run_init_config(&output, symbols, force),
    }
}

/// Logs go to stderr so stdout carries only the tables.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: &Path) -> Result<AnalysisConfig> {
    AnalysisConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_analyze_cmd(config_path: &Path, output_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let report = run_from_config(&config)?;
    print_report(&report);
    let run_dir = save_report(&report, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_optimize_cmd(config_path: &Path, mode: ModeArg, target: Option<f64>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let mode = match (mode, target) {
        (ModeArg::MaxSharpe, _) => OptimizationMode::MaxSharpe,
        (ModeArg::MinVolatility, _) => OptimizationMode::MinVolatility,
        (ModeArg::TargetReturn, Some(target)) => OptimizationMode::TargetReturn { target },
        (ModeArg::TargetReturn, None) => bail!("--target is required with --mode target-return"),
    };

    let store = load_config_store(&config)?;
    let data = prepare(&config, &store)?;
    let portfolio = data.optimizer(&config).optimize(mode)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&portfolio)?);
    } else {
        print_portfolio(&portfolio);
    }
    Ok(())
}

fn run_frontier_cmd(config_path: &Path, points: Option<usize>, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let points = points.unwrap_or(config.frontier_points);
    if points == 0 {
        bail!("--points must be positive");
    }

    let store = load_config_store(&config)?;
    let data = prepare(&config, &store)?;
    let frontier = EfficientFrontierBuilder::new(points).build_parallel(&data.optimizer(&config))?;
    print_frontier(&frontier);

    if let Some(path) = output {
        std::fs::write(path, export_frontier_csv(&frontier)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Frontier saved to: {}", path.display());
    }
    Ok(())
}

fn run_stress_cmd(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let store = load_config_store(&config)?;
    let table = run_stress(&config, &store)?;
    print_stress(&table);
    Ok(())
}

fn run_init_config(output: &Path, symbols: Vec<String>, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    let config = AnalysisConfig::for_symbols(symbols);
    config.validate()?;
    std::fs::write(output, config.to_toml()?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(path = %output.display(), "config written");
    println!("Config written to: {}", output.display());
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn print_report(report: &AnalysisReport) {
    println!();
    println!("=== Portfolio Analysis ===");
    println!("Run:            {}", report.run_id.chars().take(12).collect::<String>());
    println!("Symbols:        {}", report.symbols.join(", "));
    println!("Period:         {} to {}", report.start_date, report.end_date);
    println!("Observations:   {}", report.observations);
    if let Some(corr) = report.average_correlation {
        println!("Avg Corr:       {corr:.3}");
    }

    println!();
    println!("--- Assets ---");
    println!("{:<10} {:>10} {:>10} {:>8} {:>8}", "Symbol", "Return", "Vol", "Sharpe", "Beta");
    for a in &report.asset_statistics {
        let beta = report
            .benchmark
            .as_ref()
            .and_then(|b| b.betas.get(&a.symbol))
            .map(|b| format!("{b:.3}"))
            .unwrap_or_else(|| "-".into());
        let sharpe = a.sharpe.map(|s| format!("{s:.3}")).unwrap_or_else(|| "-".into());
        println!(
            "{:<10} {:>10} {:>10} {:>8} {:>8}",
            a.symbol,
            pct(a.annual_return),
            pct(a.annual_volatility),
            sharpe,
            beta
        );
    }

    println!();
    println!("--- Optimization ---");
    if let Some(eq) = &report.equal_weight {
        println!(
            "{:<24} return {:>8}  vol {:>8}  sharpe {:.3}",
            "equal_weight",
            pct(eq.expected_return),
            pct(eq.volatility),
            eq.sharpe_ratio
        );
    }
    for m in &report.optimizations {
        match &m.result {
            ModeResult::Solved { allocation, .. } => {
                let s = &allocation.statistics;
                println!(
                    "{:<24} return {:>8}  vol {:>8}  sharpe {:.3}",
                    m.label,
                    pct(s.expected_return),
                    pct(s.volatility),
                    s.sharpe_ratio
                );
            }
            ModeResult::Failed { reason } => println!("{:<24} FAILED: {reason}", m.label),
        }
    }
    println!(
        "Frontier:       {} points ({} failed)",
        report.frontier.len(),
        report.frontier.failed_count()
    );
    if let Some(best) = &report.monte_carlo.best_sharpe {
        println!(
            "Monte Carlo:    {} samples, best sharpe {:.3}",
            report.monte_carlo.samples, best.statistics.sharpe_ratio
        );
    }

    let p = &report.portfolio;
    println!();
    println!("--- Risk ({}) ---", p.weighting);
    println!("VaR 95%:        {} (${:.0})", pct(p.tail.var_95), p.dollar_var_95);
    println!("VaR 99%:        {} (${:.0})", pct(p.tail.var_99), p.dollar_var_99);
    println!("CVaR 95%:       {} (${:.0})", pct(p.tail.cvar_95), p.dollar_cvar_95);
    println!(
        "VaR 95% (h/p/mc): {} / {} / {}",
        pct(p.var_95.historical),
        pct(p.var_95.parametric),
        pct(p.var_95.monte_carlo)
    );
    println!("Max Drawdown:   {}", pct(p.tail.max_drawdown));
    match &p.ratios {
        RatioOutcome::Reported { ratios } => {
            println!("Sharpe:         {:.3}", ratios.sharpe);
            match ratios.sortino {
                Some(s) => println!("Sortino:        {s:.3}"),
                None => println!("Sortino:        -"),
            }
            println!("Calmar:         {:.3}", ratios.calmar);
        }
        RatioOutcome::Failed { reason } => println!("Ratios:         unavailable ({reason})"),
    }
    if p.tail.is_low_confidence() {
        println!("WARNING: only {} observations; estimates are unreliable", p.tail.observations);
    }
    for a in &report.asset_risk {
        if let AssetRisk::Failed { reason } = &a.risk {
            println!("WARNING: no risk report for {}: {reason}", a.symbol);
        }
    }

    println!();
    println!("--- Stress ---");
    for (name, r) in &report.stress {
        println!(
            "{:<22} VaR95 {:>8}  CVaR95 {:>8}  loss ${:.0}",
            name,
            pct(r.var_95),
            pct(r.cvar_95),
            r.expected_dollar_loss
        );
    }

    println!();
    println!("--- Recommendations ---");
    for r in &report.recommendations {
        println!("- {}", r.message);
    }
}

fn print_portfolio(p: &OptimizedPortfolio) {
    println!();
    println!("=== {} ===", p.mode);
    println!("Expected Return: {}", pct(p.statistics.expected_return));
    println!("Volatility:      {}", pct(p.statistics.volatility));
    println!("Sharpe:          {:.3}", p.statistics.sharpe_ratio);
    println!("Iterations:      {}", p.iterations);
    println!();
    for (symbol, w) in p.allocation() {
        println!("{symbol:<10} {:>8}", pct(w));
    }
}

fn print_frontier(frontier: &EfficientFrontier) {
    println!();
    println!("{:>10} {:>10} {:>10} {:>8}", "Target", "Return", "Vol", "Sharpe");
    for point in &frontier.points {
        match point.triple() {
            Some((ret, vol, sharpe)) => println!(
                "{:>10} {:>10} {:>10} {:>8.3}",
                pct(point.target_return),
                pct(ret),
                pct(vol),
                sharpe
            ),
            None => println!("{:>10} {:>10}", pct(point.target_return), "failed"),
        }
    }
    if let Some(best) = frontier.max_sharpe_point().and_then(|p| p.triple()) {
        println!();
        println!("Best Sharpe on frontier: {:.3} at vol {}", best.2, pct(best.1));
    }
}

fn print_stress(table: &StressTable) {
    println!();
    println!("=== Stress Test ({}) ===", table.weighting);
    for (symbol, w) in &table.weights {
        println!("{symbol:<10} {:>8}", pct(*w));
    }
    println!();
    println!(
        "{:<22} {:>8} {:>8} {:>8} {:>12}",
        "Scenario", "VaR95", "VaR99", "CVaR95", "Loss"
    );
    for (name, r) in &table.results {
        println!(
            "{:<22} {:>8} {:>8} {:>8} {:>12.0}",
            name,
            pct(r.var_95),
            pct(r.var_99),
            pct(r.cvar_95),
            r.expected_dollar_loss
        );
    }
}
