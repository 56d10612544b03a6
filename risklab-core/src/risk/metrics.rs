//! Drawdown and risk-adjusted ratios: pure functions, return series in,
//! scalar out.

use crate::error::{EngineError, Result};
use crate::portfolio::ZERO_VOLATILITY;
use crate::stats::{mean, sample_covariance, sample_std, ZERO_VARIANCE};

// ─── Drawdown ───────────────────────────────────────────────────────

/// Wealth path starting at 1.0 and compounded by each return.
///
/// The result has `returns.len() + 1` points.
pub fn wealth_curve(returns: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(returns.len() + 1);
    let mut wealth = 1.0;
    curve.push(wealth);
    for r in returns {
        wealth *= 1.0 + r;
        curve.push(wealth);
    }
    curve
}

/// Maximum drawdown as a non-positive fraction (-0.15 = a 15% drawdown).
///
/// Exactly 0.0 when no return is negative.
pub fn max_drawdown(returns: &[f64]) -> Result<f64> {
    if returns.is_empty() {
        return Err(EngineError::insufficient("max drawdown", 1, 0));
    }
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    for wealth in wealth_curve(returns) {
        if wealth > peak {
            peak = wealth;
        }
        if peak > 0.0 {
            max_dd = max_dd.min(wealth / peak - 1.0);
        }
    }
    Ok(max_dd)
}

// ─── Annualized moments ─────────────────────────────────────────────

/// mean × periods per year
pub fn annual_return(returns: &[f64], periods_per_year: f64) -> Result<f64> {
    check_ratio_input(returns, "annual return")?;
    Ok(mean(returns) * periods_per_year)
}

/// sample std × √periods per year
pub fn annual_volatility(returns: &[f64], periods_per_year: f64) -> Result<f64> {
    check_ratio_input(returns, "annual volatility")?;
    Ok(sample_std(returns) * periods_per_year.sqrt())
}

// ─── Ratios ─────────────────────────────────────────────────────────

/// (annual return − rf) / annual volatility.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Result<f64> {
    let ret = annual_return(returns, periods_per_year)?;
    let vol = annual_volatility(returns, periods_per_year)?;
    if vol < ZERO_VOLATILITY {
        return Err(EngineError::DegenerateVolatility {
            context: "sharpe ratio",
        });
    }
    Ok((ret - risk_free_rate) / vol)
}

/// (annual return − rf) / annualized sample std of the negative returns.
///
/// `None` with fewer than two negative returns or zero downside deviation.
pub fn sortino_ratio(
    returns: &[f64],
    risk_free_rate: f64,
    periods_per_year: f64,
) -> Result<Option<f64>> {
    let ret = annual_return(returns, periods_per_year)?;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.len() < 2 {
        return Ok(None);
    }
    let downside_vol = sample_std(&downside) * periods_per_year.sqrt();
    if downside_vol < ZERO_VOLATILITY {
        return Ok(None);
    }
    Ok(Some((ret - risk_free_rate) / downside_vol))
}

/// annual return / |max drawdown|, or 0.0 without a drawdown.
pub fn calmar_ratio(returns: &[f64], periods_per_year: f64) -> Result<f64> {
    let ret = annual_return(returns, periods_per_year)?;
    let dd = max_drawdown(returns)?;
    if dd == 0.0 {
        return Ok(0.0);
    }
    Ok(ret / dd.abs())
}

/// Sample cov(asset, market) / sample var(market) over paired observations.
pub fn beta(asset: &[f64], market: &[f64]) -> Result<f64> {
    if asset.len() != market.len() {
        return Err(EngineError::invalid(format!(
            "beta needs paired series, got {} and {} observations",
            asset.len(),
            market.len()
        )));
    }
    check_ratio_input(market, "beta")?;
    let var = sample_covariance(market, market);
    if var <= ZERO_VARIANCE {
        return Err(EngineError::DegenerateVolatility {
            context: "beta market series",
        });
    }
    Ok(sample_covariance(asset, market) / var)
}

fn check_ratio_input(returns: &[f64], context: &'static str) -> Result<()> {
    if returns.len() < 2 {
        return Err(EngineError::insufficient(context, 2, returns.len()));
    }
    Ok(())
}
