//! Price table loading.
//!
//! Each asset lives in `<data_dir>/<SYMBOL>.csv` with a date column and a
//! close column. Header names are matched case-insensitively; an adjusted
//! close is preferred over the raw close when both are present. Rows are sorted
//! by date before conversion, and duplicate dates are rejected by the core.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use risklab_core::{AssetReturnSeries, EngineError, ReturnSeriesStore};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Accepted date headers.
const DATE_HEADERS: &[&str] = &["date", "timestamp"];

/// Accepted close headers, highest priority first.
const CLOSE_HEADERS: &[&str] = &["adj_close", "adj close", "adjclose", "close"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{} has no {column} column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("invalid price data for '{symbol}': {source}")]
    Engine {
        symbol: String,
        source: EngineError,
    },
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    close: f64,
}

/// Path of a symbol's price table under `dir`.
pub fn price_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}.csv"))
}

/// Read a `(date, close)` table and convert it to simple returns.
pub fn load_price_series(path: &Path, symbol: &str) -> Result<AssetReturnSeries, LoadError> {
    let mut prices = read_prices(path)?;
    prices.sort_by_key(|(date, _)| *date);
    debug!(symbol, rows = prices.len(), path = %path.display(), "loaded price table");
    AssetReturnSeries::from_prices(symbol, &prices).map_err(|source| LoadError::Engine {
        symbol: symbol.to_string(),
        source,
    })
}

/// Load every symbol's table from `dir` into a store.
pub fn load_store<S: AsRef<str>>(dir: &Path, symbols: &[S]) -> Result<ReturnSeriesStore, LoadError> {
    symbols
        .iter()
        .map(|s| {
            let symbol = s.as_ref();
            load_price_series(&price_path(dir, symbol), symbol)
        })
        .collect()
}

fn read_prices(path: &Path) -> Result<Vec<(NaiveDate, f64)>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers = normalized_headers(path, reader.headers().map_err(csv_err)?)?;

    reader
        .records()
        .map(|record| {
            let row: PriceRow = record
                .and_then(|r| r.deserialize(Some(&headers)))
                .map_err(csv_err)?;
            Ok((row.date, row.close))
        })
        .collect()
}

/// Rename the chosen date and close columns to `date` / `close` and every
/// other column to a placeholder the row struct ignores.
fn normalized_headers(path: &Path, raw: &StringRecord) -> Result<StringRecord, LoadError> {
    let lower: Vec<String> = raw.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|c| lower.iter().position(|h| h == c))
    };
    let date_col = find(DATE_HEADERS).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column: "date",
    })?;
    let close_col = find(CLOSE_HEADERS).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        column: "close",
    })?;

    Ok((0..lower.len())
        .map(|i| match i {
            i if i == date_col => "date".to_string(),
            i if i == close_col => "close".to_string(),
            i => format!("_unused_{i}"),
        })
        .collect())
}
