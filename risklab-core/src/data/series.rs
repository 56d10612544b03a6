//! Per-asset return series.
//!
//! A series is a symbol plus `(date, fractional return)` pairs with strictly
//! increasing dates. Series built from a price table use simple returns
//! `p[t] / p[t-1] - 1`; duplicate price dates are rejected, never collapsed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One dated fractional return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered return history for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReturnSeries {
    symbol: String,
    observations: Vec<ReturnObservation>,
}

impl AssetReturnSeries {
    /// Build a series from observations, validating order and finiteness.
    pub fn new(symbol: impl Into<String>, observations: Vec<ReturnObservation>) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(EngineError::invalid("asset symbol must not be empty"));
        }
        check_strictly_increasing(&symbol, observations.iter().map(|o| o.date))?;
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(EngineError::invalid(format!(
                "{symbol}: non-finite return on {}",
                bad.date
            )));
        }
        Ok(Self {
            symbol,
            observations,
        })
    }

    /// Build a series from `(date, return)` pairs.
    pub fn from_pairs(symbol: impl Into<String>, pairs: &[(NaiveDate, f64)]) -> Result<Self> {
        let observations = pairs
            .iter()
            .map(|&(date, value)| ReturnObservation { date, value })
            .collect();
        Self::new(symbol, observations)
    }

    /// Convert a `(date, close)` price table into simple returns.
    ///
    /// Requires at least two prices, strictly increasing dates and finite,
    /// positive prices. The return for date `t` is dated `t`.
    pub fn from_prices(symbol: impl Into<String>, prices: &[(NaiveDate, f64)]) -> Result<Self> {
        let symbol = symbol.into();
        if prices.len() < 2 {
            return Err(EngineError::insufficient("price history", 2, prices.len()));
        }
        check_strictly_increasing(&symbol, prices.iter().map(|p| p.0))?;
        if let Some((date, price)) = prices.iter().find(|p| !(p.1.is_finite() && p.1 > 0.0)) {
            return Err(EngineError::invalid(format!(
                "{symbol}: price {price} on {date} is not a positive finite number"
            )));
        }

        let observations = prices
            .windows(2)
            .map(|w| ReturnObservation {
                date: w[1].0,
                value: w[1].1 / w[0].1 - 1.0,
            })
            .collect();
        Self::new(symbol, observations)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn observations(&self) -> &[ReturnObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Return values without dates, in date order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

pub(crate) fn check_strictly_increasing(
    symbol: &str,
    dates: impl Iterator<Item = NaiveDate>,
) -> Result<()> {
    let mut prev: Option<NaiveDate> = None;
    for date in dates {
        if let Some(p) = prev {
            if date == p {
                return Err(EngineError::invalid(format!(
                    "{symbol}: duplicate date {date}"
                )));
            }
            if date < p {
                return Err(EngineError::invalid(format!(
                    "{symbol}: date {date} follows {p} (dates must be ascending)"
                )));
            }
        }
        prev = Some(date);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn prices_become_simple_returns() {
        let prices = vec![
            (d("2024-01-02"), 100.0),
            (d("2024-01-03"), 110.0),
            (d("2024-01-04"), 99.0),
        ];
        let series = AssetReturnSeries::from_prices("SPY", &prices).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(d("2024-01-03")));
        let v = series.values();
        assert!((v[0] - 0.10).abs() < 1e-12);
        assert!((v[1] - (-0.10)).abs() < 1e-12);
    }

    #[test]
    fn duplicate_price_dates_are_rejected() {
        let prices = vec![
            (d("2024-01-02"), 100.0),
            (d("2024-01-02"), 101.0),
            (d("2024-01-03"), 102.0),
        ];
        let err = AssetReturnSeries::from_prices("SPY", &prices).unwrap_err();
        assert!(err.to_string().contains("duplicate date"), "got {err}");
    }

    #[test]
    fn descending_dates_are_rejected() {
        let pairs = vec![(d("2024-01-03"), 0.01), (d("2024-01-02"), 0.02)];
        assert!(matches!(
            AssetReturnSeries::from_pairs("QQQ", &pairs),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let prices = vec![(d("2024-01-02"), 100.0), (d("2024-01-03"), 0.0)];
        assert!(AssetReturnSeries::from_prices("X", &prices).is_err());
    }

    #[test]
    fn single_price_is_insufficient() {
        let prices = vec![(d("2024-01-02"), 100.0)];
        assert!(matches!(
            AssetReturnSeries::from_prices("X", &prices),
            Err(EngineError::InsufficientData { actual: 1, .. })
        ));
    }

    #[test]
    fn nan_return_is_rejected() {
        let pairs = vec![(d("2024-01-02"), f64::NAN)];
        assert!(AssetReturnSeries::from_pairs("X", &pairs).is_err());
    }

    #[test]
    fn empty_symbol_is_rejected() {
        assert!(AssetReturnSeries::new("  ", Vec::new()).is_err());
    }
}
