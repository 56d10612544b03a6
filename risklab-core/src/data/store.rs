//! In-memory store of per-asset return series.

use std::collections::BTreeMap;

use super::align::{align_series, ReturnMatrix};
use super::series::AssetReturnSeries;
use crate::error::{EngineError, Result};

/// Holds one return series per symbol and produces aligned matrices on demand.
#[derive(Debug, Clone, Default)]
pub struct ReturnSeriesStore {
    series: BTreeMap<String, AssetReturnSeries>,
}

impl ReturnSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a series, returning the one it replaced for the same symbol.
    pub fn insert(&mut self, series: AssetReturnSeries) -> Option<AssetReturnSeries> {
        self.series.insert(series.symbol().to_string(), series)
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetReturnSeries> {
        self.series.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    /// Symbols in sorted order.
    pub fn symbols(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Align the requested symbols (in the requested order) on their common dates.
    pub fn align<S: AsRef<str>>(&self, symbols: &[S]) -> Result<ReturnMatrix> {
        let picked = symbols
            .iter()
            .map(|s| {
                let s = s.as_ref();
                self.series.get(s).ok_or_else(|| EngineError::MissingAsset {
                    symbol: s.to_string(),
                })
            })
            .collect::<Result<Vec<&AssetReturnSeries>>>()?;
        align_series(&picked)
    }

    /// Align every stored symbol.
    pub fn align_all(&self) -> Result<ReturnMatrix> {
        let all: Vec<&AssetReturnSeries> = self.series.values().collect();
        align_series(&all)
    }
}

impl FromIterator<AssetReturnSeries> for ReturnSeriesStore {
    fn from_iter<I: IntoIterator<Item = AssetReturnSeries>>(iter: I) -> Self {
        let mut store = Self::new();
        for s in iter {
            store.insert(s);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(symbol: &str, start_day: u32, values: &[f64]) -> AssetReturnSeries {
        let pairs: Vec<(NaiveDate, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                (
                    NaiveDate::from_ymd_opt(2024, 1, start_day + i as u32).unwrap(),
                    v,
                )
            })
            .collect();
        AssetReturnSeries::from_pairs(symbol, &pairs).unwrap()
    }

    #[test]
    fn align_respects_requested_order() {
        let store: ReturnSeriesStore = vec![
            series("AAPL", 1, &[0.01, 0.02, 0.03]),
            series("MSFT", 2, &[0.05, 0.06]),
        ]
        .into_iter()
        .collect();

        let m = store.align(&["MSFT", "AAPL"]).unwrap();
        assert_eq!(m.symbols(), &["MSFT".to_string(), "AAPL".to_string()]);
        assert_eq!(m.n_observations(), 2);
        assert_eq!(m.column(1).unwrap(), &[0.02, 0.03]);
    }

    #[test]
    fn missing_symbol_is_reported() {
        let store: ReturnSeriesStore = vec![series("AAPL", 1, &[0.01])].into_iter().collect();
        assert!(matches!(
            store.align(&["AAPL", "GOOGL"]),
            Err(EngineError::MissingAsset { symbol }) if symbol == "GOOGL"
        ));
    }

    #[test]
    fn insert_replaces_same_symbol() {
        let mut store = ReturnSeriesStore::new();
        assert!(store.insert(series("A", 1, &[0.01])).is_none());
        let old = store.insert(series("A", 1, &[0.02])).unwrap();
        assert_eq!(old.values(), vec![0.01]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.symbols(), vec!["A"]);
    }
}
