//! Multi-asset time alignment.
//!
//! Given return series for multiple assets, align them to their common
//! timeline. Alignment is an inner join: a date survives only if every asset
//! has an observation on it. Nothing is forward-filled or zero-filled.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::series::{check_strictly_increasing, AssetReturnSeries};
use crate::error::{EngineError, Result};

/// Aligned T × N return table: one fully populated column per asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMatrix {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    /// Column-major: `columns[i][t]` is asset `i` on `dates[t]`.
    columns: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    /// Build a matrix from already aligned columns.
    pub fn new(symbols: Vec<String>, dates: Vec<NaiveDate>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(EngineError::insufficient("return matrix assets", 1, 0));
        }
        if dates.is_empty() {
            return Err(EngineError::insufficient("aligned observations", 1, 0));
        }
        if symbols.len() != columns.len() {
            return Err(EngineError::invalid(format!(
                "{} symbols but {} columns",
                symbols.len(),
                columns.len()
            )));
        }
        let unique: BTreeSet<&str> = symbols.iter().map(String::as_str).collect();
        if unique.len() != symbols.len() {
            return Err(EngineError::invalid("duplicate symbol in return matrix"));
        }
        check_strictly_increasing("return matrix", dates.iter().copied())?;
        for (symbol, column) in symbols.iter().zip(&columns) {
            if column.len() != dates.len() {
                return Err(EngineError::invalid(format!(
                    "{symbol}: column has {} values for {} dates",
                    column.len(),
                    dates.len()
                )));
            }
            if column.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::invalid(format!("{symbol}: non-finite return")));
            }
        }
        Ok(Self {
            symbols,
            dates,
            columns,
        })
    }

    /// Build a matrix from raw columns on a synthetic daily calendar
    /// starting 2000-01-01. Useful when only the numbers matter.
    pub fn from_columns(symbols: &[&str], columns: Vec<Vec<f64>>) -> Result<Self> {
        let t = columns.first().map_or(0, Vec::len);
        let base = NaiveDate::default() + Duration::days(10_957);
        let dates = (0..t).map(|i| base + Duration::days(i as i64)).collect();
        Self::new(symbols.iter().map(|s| s.to_string()).collect(), dates, columns)
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn n_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn n_observations(&self) -> usize {
        self.dates.len()
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn index_of(&self, symbol: &str) -> Result<usize> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .ok_or_else(|| EngineError::MissingAsset {
                symbol: symbol.to_string(),
            })
    }

    /// Returns for one asset, by symbol.
    pub fn column_by_symbol(&self, symbol: &str) -> Result<&[f64]> {
        let i = self.index_of(symbol)?;
        Ok(&self.columns[i])
    }

    /// Sub-matrix with the requested symbols in the requested order.
    pub fn select<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Self> {
        let mut picked = Vec::with_capacity(symbols.len());
        let mut columns = Vec::with_capacity(symbols.len());
        for s in symbols {
            let i = self.index_of(s.as_ref())?;
            picked.push(self.symbols[i].clone());
            columns.push(self.columns[i].clone());
        }
        Self::new(picked, self.dates.clone(), columns)
    }

    /// Weighted portfolio return per date: `r_p[t] = Σ_i w_i r_i[t]`.
    pub fn portfolio_returns(&self, weights: &[f64]) -> Result<Vec<f64>> {
        if weights.len() != self.n_assets() {
            return Err(EngineError::invalid(format!(
                "{} weights for {} assets",
                weights.len(),
                self.n_assets()
            )));
        }
        let mut out = vec![0.0; self.n_observations()];
        for (w, column) in weights.iter().zip(&self.columns) {
            for (acc, r) in out.iter_mut().zip(column) {
                *acc += w * r;
            }
        }
        Ok(out)
    }
}

/// Align multiple series on the intersection of their dates.
///
/// Fails with `InsufficientData` when no series is given or when the
/// intersection is empty.
pub fn align_series(series: &[&AssetReturnSeries]) -> Result<ReturnMatrix> {
    let Some((first, rest)) = series.split_first() else {
        return Err(EngineError::insufficient("alignment assets", 1, 0));
    };

    // Intersection of all series' dates
    let mut common: BTreeSet<NaiveDate> = first.observations().iter().map(|o| o.date).collect();
    for s in rest {
        let dates: BTreeSet<NaiveDate> = s.observations().iter().map(|o| o.date).collect();
        common.retain(|d| dates.contains(d));
    }
    let dates: Vec<NaiveDate> = common.into_iter().collect();
    if dates.is_empty() {
        return Err(EngineError::insufficient("aligned observations", 1, 0));
    }

    let mut symbols = Vec::with_capacity(series.len());
    let mut columns = Vec::with_capacity(series.len());
    for s in series {
        let by_date: HashMap<NaiveDate, f64> = s
            .observations()
            .iter()
            .map(|o| (o.date, o.value))
            .collect();
        let column = dates
            .iter()
            .map(|d| {
                by_date.get(d).copied().ok_or_else(|| {
                    EngineError::invalid(format!("{}: lost date {d} during alignment", s.symbol()))
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        symbols.push(s.symbol().to_string());
        columns.push(column);
    }

    ReturnMatrix::new(symbols, dates, columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(symbol: &str, rows: &[(&str, f64)]) -> AssetReturnSeries {
        let pairs: Vec<(NaiveDate, f64)> = rows.iter().map(|&(s, v)| (d(s), v)).collect();
        AssetReturnSeries::from_pairs(symbol, &pairs).unwrap()
    }

    #[test]
    fn align_drops_dates_missing_from_any_asset() {
        let spy = series(
            "SPY",
            &[("2024-01-02", 0.01), ("2024-01-03", 0.02), ("2024-01-04", 0.03)],
        );
        let qqq = series("QQQ", &[("2024-01-02", -0.01), ("2024-01-04", -0.03)]);

        let m = align_series(&[&spy, &qqq]).unwrap();

        assert_eq!(m.dates(), &[d("2024-01-02"), d("2024-01-04")]);
        assert_eq!(m.column_by_symbol("SPY").unwrap(), &[0.01, 0.03]);
        assert_eq!(m.column_by_symbol("QQQ").unwrap(), &[-0.01, -0.03]);
    }

    #[test]
    fn disjoint_calendars_are_insufficient() {
        let a = series("A", &[("2024-01-02", 0.01)]);
        let b = series("B", &[("2024-01-03", 0.01)]);
        assert!(matches!(
            align_series(&[&a, &b]),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn no_series_is_insufficient() {
        assert!(align_series(&[]).is_err());
    }

    #[test]
    fn missing_symbol_lookup() {
        let m = ReturnMatrix::from_columns(&["A"], vec![vec![0.01, 0.02]]).unwrap();
        assert!(matches!(
            m.column_by_symbol("B"),
            Err(EngineError::MissingAsset { symbol }) if symbol == "B"
        ));
    }

    #[test]
    fn portfolio_returns_are_weighted_sums() {
        let m = ReturnMatrix::from_columns(
            &["A", "B"],
            vec![vec![0.10, -0.02], vec![0.00, 0.04]],
        )
        .unwrap();
        let rp = m.portfolio_returns(&[0.5, 0.5]).unwrap();
        assert!((rp[0] - 0.05).abs() < 1e-12);
        assert!((rp[1] - 0.01).abs() < 1e-12);
        assert!(m.portfolio_returns(&[1.0]).is_err());
    }

    #[test]
    fn select_reorders_columns() {
        let m = ReturnMatrix::from_columns(&["A", "B", "C"], vec![vec![1.0], vec![2.0], vec![3.0]])
            .unwrap();
        let s = m.select(&["C", "A"]).unwrap();
        assert_eq!(s.symbols(), &["C".to_string(), "A".to_string()]);
        assert_eq!(s.column(0).unwrap(), &[3.0]);
    }

    #[test]
    fn from_columns_rejects_ragged_input() {
        assert!(ReturnMatrix::from_columns(&["A", "B"], vec![vec![0.1, 0.2], vec![0.1]]).is_err());
    }

    #[test]
    fn from_columns_starts_in_2000() {
        let m = ReturnMatrix::from_columns(&["A"], vec![vec![0.0, 0.0]]).unwrap();
        assert_eq!(m.dates()[0], d("2000-01-01"));
        assert_eq!(m.dates()[1], d("2000-01-02"));
    }
}
