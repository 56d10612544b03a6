//! Report export: JSON and CSV artifacts.
//!
//! - **JSON**: the full `AnalysisReport` with a `schema_version` field; newer
//!   versions are rejected on load
//! - **CSV**: frontier, stress table, allocations and per-asset figures for
//!   spreadsheet tools

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use risklab_core::{EfficientFrontier, FrontierOutcome};

use crate::analysis::{Allocation, AnalysisReport, AssetRisk, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: target_return, status, expected_return, volatility, sharpe,
/// reason, then one weight column per symbol. Failed points leave the figures
/// empty and fill `reason`.
pub fn export_frontier_csv(frontier: &EfficientFrontier) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = [
        "target_return",
        "status",
        "expected_return",
        "volatility",
        "sharpe",
        "reason",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    header.extend(frontier.symbols.iter().map(|s| format!("w_{s}")));
    wtr.write_record(&header)?;

    for point in &frontier.points {
        let mut row = vec![format!("{:.6}", point.target_return)];
        match &point.outcome {
            FrontierOutcome::Solved {
                expected_return,
                volatility,
                sharpe,
                weights,
            } => {
                row.push("solved".into());
                row.push(format!("{expected_return:.6}"));
                row.push(format!("{volatility:.6}"));
                row.push(format!("{sharpe:.4}"));
                row.push(String::new());
                row.extend(weights.iter().map(|w| format!("{w:.6}")));
            }
            FrontierOutcome::Failed { reason } => {
                row.push("failed".into());
                row.extend([String::new(), String::new(), String::new()]);
                row.push(reason.clone());
                row.extend(frontier.symbols.iter().map(|_| String::new()));
            }
        }
        wtr.write_record(&row)?;
    }

    finish(wtr)
}

/// One row per scenario, in scenario-name order.
pub fn export_stress_csv(report: &AnalysisReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["scenario", "var_95", "var_99", "cvar_95", "expected_dollar_loss"])?;
    for (name, r) in &report.stress {
        wtr.write_record([
            name.as_str(),
            &format!("{:.6}", r.var_95),
            &format!("{:.6}", r.var_99),
            &format!("{:.6}", r.cvar_95),
            &format!("{:.2}", r.expected_dollar_loss),
        ])?;
    }
    finish(wtr)
}

/// Every solved allocation: optimization modes, Monte Carlo extremes and
/// the analyzed portfolio. Failed modes are omitted; the portfolio row leaves
/// `sharpe` empty when its ratios failed.
pub fn export_weights_csv(report: &AnalysisReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header: Vec<String> = ["allocation", "expected_return", "volatility", "sharpe"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    header.extend(report.symbols.iter().cloned());
    wtr.write_record(&header)?;

    let mut rows: Vec<(String, &Allocation)> = report
        .optimizations
        .iter()
        .filter_map(|m| m.allocation().map(|a| (m.label.clone(), a)))
        .collect();
    if let Some(a) = &report.monte_carlo.best_sharpe {
        rows.push(("monte_carlo_best_sharpe".into(), a));
    }
    if let Some(a) = &report.monte_carlo.min_volatility {
        rows.push(("monte_carlo_min_volatility".into(), a));
    }

    for (label, a) in rows {
        let mut row = vec![
            label,
            format!("{:.6}", a.statistics.expected_return),
            format!("{:.6}", a.statistics.volatility),
            format!("{:.4}", a.statistics.sharpe_ratio),
        ];
        row.extend(
            report
                .symbols
                .iter()
                .map(|s| format!("{:.6}", a.weights.get(s).copied().unwrap_or(0.0))),
        );
        wtr.write_record(&row)?;
    }

    let p = &report.portfolio;
    let mut row = vec![
        format!("portfolio_{}", p.weighting),
        format!("{:.6}", p.tail.annual_return),
        format!("{:.6}", p.tail.annual_volatility),
        p.ratios
            .sharpe()
            .map(|s| format!("{s:.4}"))
            .unwrap_or_default(),
    ];
    row.extend(
        report
            .symbols
            .iter()
            .map(|s| format!("{:.6}", p.weights.get(s).copied().unwrap_or(0.0))),
    );
    wtr.write_record(&row)?;

    finish(wtr)
}

/// Per-asset annual figures and risk report; failed reports leave the risk
/// columns empty.
pub fn export_assets_csv(report: &AnalysisReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "annual_return",
        "annual_volatility",
        "sharpe",
        "beta",
        "var_95",
        "cvar_95",
        "max_drawdown",
        "sortino",
    ])?;

    for (stats, outcome) in report.asset_statistics.iter().zip(&report.asset_risk) {
        let opt = |v: Option<f64>| v.map(|x| format!("{x:.4}")).unwrap_or_default();
        let beta = report
            .benchmark
            .as_ref()
            .and_then(|b| b.betas.get(&stats.symbol).copied());
        let (var_95, cvar_95, mdd, sortino) = match &outcome.risk {
            AssetRisk::Reported { report: r } => (
                format!("{:.6}", r.var_95),
                format!("{:.6}", r.cvar_95),
                format!("{:.6}", r.max_drawdown),
                opt(r.sortino),
            ),
            AssetRisk::Failed { .. } => Default::default(),
        };
        wtr.write_record([
            stats.symbol.as_str(),
            &format!("{:.6}", stats.annual_return),
            &format!("{:.6}", stats.annual_volatility),
            &opt(stats.sharpe),
            &opt(beta),
            &var_95,
            &cvar_95,
            &mdd,
            &sortino,
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set under `output_dir/risklab_<run id prefix>/`:
/// `report.json`, `frontier.csv`, `stress.csv`, `weights.csv`, `assets.csv`.
///
/// The directory name depends only on the config, so re-running a config
/// overwrites its previous artifacts. Returns the created directory.
pub fn save_report(report: &AnalysisReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("risklab_{prefix}"));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let artifacts = [
        ("report.json", export_json(report)?),
        ("frontier.csv", export_frontier_csv(&report.frontier)?),
        ("stress.csv", export_stress_csv(report)?),
        ("weights.csv", export_weights_csv(report)?),
        ("assets.csv", export_assets_csv(report)?),
    ];
    for (name, body) in artifacts {
        let path = run_dir.join(name);
        std::fs::write(&path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(run_dir)
}

/// Load `report.json` from a directory written by [`save_report`].
pub fn load_report(dir: &Path) -> Result<AnalysisReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::report;
    use crate::analysis::RatioOutcome;

    fn lines(csv: &str) -> Vec<&str> {
        csv.lines().collect()
    }

    #[test]
    fn json_loads_back() {
        let report = report();
        let loaded = import_json(&export_json(&report).unwrap()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.symbols, report.symbols);
        assert!(loaded.stress.keys().eq(report.stress.keys()));
        assert_eq!(loaded.frontier.len(), report.frontier.len());
    }

    #[test]
    fn json_rejects_newer_schema() {
        let mut report = report();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = serde_json::to_string(&report).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn frontier_csv_has_weight_columns() {
        let report = report();
        let csv = export_frontier_csv(&report.frontier).unwrap();
        let rows = lines(&csv);
        assert_eq!(
            rows[0],
            "target_return,status,expected_return,volatility,sharpe,reason,w_AAA,w_BBB,w_CCC"
        );
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), report.frontier.len());
        assert!(records.iter().all(|r| r.len() == 9));
    }

    #[test]
    fn stress_csv_is_sorted_by_name() {
        let csv = export_stress_csv(&report()).unwrap();
        let names: Vec<&str> = lines(&csv)[1..]
            .iter()
            .map(|r| r.split(',').next().unwrap())
            .collect();
        assert_eq!(
            names,
            ["high_volatility", "interest_rate_shock", "market_crash", "recession"]
        );
    }

    #[test]
    fn weights_csv_lists_solved_allocations_and_portfolio() {
        let csv = export_weights_csv(&report()).unwrap();
        let rows = lines(&csv);
        assert_eq!(rows[0], "allocation,expected_return,volatility,sharpe,AAA,BBB,CCC");
        assert!(rows.iter().any(|r| r.starts_with("max_sharpe,")));
        assert!(rows.iter().any(|r| r.starts_with("monte_carlo_best_sharpe,")));
        assert!(rows
            .last()
            .unwrap()
            .starts_with("portfolio_equal_weight,"));
    }

    #[test]
    fn weights_csv_leaves_undefined_sharpe_empty() {
        let mut report = report();
        report.portfolio.ratios = RatioOutcome::Failed {
            reason: "zero volatility".into(),
        };
        let csv = export_weights_csv(&report).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let last = reader.records().last().unwrap().unwrap();
        assert_eq!(&last[0], "portfolio_equal_weight");
        assert_eq!(&last[3], "");
        assert!(!last[1].is_empty());
    }

    #[test]
    fn assets_csv_has_one_row_per_symbol() {
        let csv = export_assets_csv(&report()).unwrap();
        assert_eq!(lines(&csv).len(), 4);
    }

    #[test]
    fn save_and_load_bundle() {
        let report = report();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_report(&report, dir.path()).unwrap();
        for name in ["report.json", "frontier.csv", "stress.csv", "weights.csv", "assets.csv"] {
            assert!(run_dir.join(name).exists(), "missing {name}");
        }
        let loaded = load_report(&run_dir).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
    }
}
