//! Value-at-Risk estimators and Conditional VaR.
//!
//! VaR is reported as a return quantile, so a more negative value is a larger
//! loss. All estimators take one-period returns and a confidence level in (0, 1).

use rand::Rng;
use rand_distr::{Distribution, Normal as SampleNormal};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{EngineError, Result};
use crate::portfolio::ZERO_VOLATILITY;
use crate::stats::{mean, sample_std};

/// Default number of Monte Carlo VaR draws.
pub const DEFAULT_VAR_SIMULATIONS: usize = 10_000;

/// Below this many observations VaR and ratio figures are low-confidence.
pub const LOW_CONFIDENCE_OBSERVATIONS: usize = 20;

/// Historical VaR: the (1 − c) quantile with linear interpolation between
/// order statistics.
pub fn historical_var(returns: &[f64], confidence: f64) -> Result<f64> {
    check_confidence(confidence)?;
    check_returns(returns, "historical VaR")?;
    let sorted = sorted(returns);
    Ok(percentile_sorted(&sorted, 1.0 - confidence))
}

/// Parametric VaR under a normal fit of the sample mean and sample std.
///
/// A zero standard deviation is a point mass, so the VaR is the mean itself.
pub fn parametric_var(returns: &[f64], confidence: f64) -> Result<f64> {
    check_confidence(confidence)?;
    check_returns(returns, "parametric VaR")?;
    let mu = mean(returns);
    let sigma = sample_std(returns);
    if sigma < ZERO_VOLATILITY {
        return Ok(mu);
    }
    let normal = Normal::new(mu, sigma)
        .map_err(|e| EngineError::invalid(format!("normal fit failed: {e}")))?;
    Ok(normal.inverse_cdf(1.0 - confidence))
}

/// Monte Carlo VaR: historical VaR of `simulations` draws from the fitted
/// normal distribution.
pub fn monte_carlo_var<R: Rng + ?Sized>(
    returns: &[f64],
    confidence: f64,
    simulations: usize,
    rng: &mut R,
) -> Result<f64> {
    check_confidence(confidence)?;
    check_returns(returns, "Monte Carlo VaR")?;
    if simulations == 0 {
        return Err(EngineError::insufficient("Monte Carlo VaR simulations", 1, 0));
    }
    let mu = mean(returns);
    let sigma = sample_std(returns);
    if sigma < ZERO_VOLATILITY {
        return Ok(mu);
    }
    let normal = SampleNormal::new(mu, sigma)
        .map_err(|e| EngineError::invalid(format!("normal fit failed: {e}")))?;
    let draws: Vec<f64> = (0..simulations).map(|_| normal.sample(rng)).collect();
    historical_var(&draws, confidence)
}

/// Conditional VaR (expected shortfall): mean of the returns at or below the
/// historical VaR.
pub fn conditional_var(returns: &[f64], confidence: f64) -> Result<f64> {
    let var = historical_var(returns, confidence)?;
    // Never empty: the quantile is at least the smallest return.
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    Ok(mean(&tail))
}

pub(crate) fn check_confidence(confidence: f64) -> Result<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(EngineError::invalid(format!(
            "confidence level {confidence} outside (0, 1)"
        )));
    }
    Ok(())
}

fn check_returns(returns: &[f64], context: &'static str) -> Result<()> {
    if returns.is_empty() {
        return Err(EngineError::insufficient(context, 1, 0));
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(EngineError::invalid(format!("{context}: non-finite return")));
    }
    Ok(())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Quantile `q ∈ [0, 1]` of sorted data, interpolating at rank q·(n − 1).
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    // Clamp against round-off so the quantile never leaves its bracket.
    (sorted[lo] * (1.0 - frac) + sorted[hi] * frac).clamp(sorted[lo], sorted[hi])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp() -> Vec<f64> {
        // -0.10, -0.09, ..., 0.10
        (0..21).map(|i| -0.10 + 0.01 * i as f64).collect()
    }

    // ── Historical ──

    #[test]
    fn historical_var_interpolates() {
        // Rank 0.05 × 20 = 1.0 → second order statistic.
        let var = historical_var(&ramp(), 0.95).unwrap();
        assert!((var - (-0.09)).abs() < 1e-12, "got {var}");

        // Rank 0.01 × 20 = 0.2 → 80% of -0.10 plus 20% of -0.09.
        let var = historical_var(&ramp(), 0.99).unwrap();
        assert!((var - (-0.098)).abs() < 1e-12, "got {var}");
    }

    #[test]
    fn historical_var_ignores_input_order() {
        let mut shuffled = ramp();
        shuffled.reverse();
        assert_eq!(
            historical_var(&shuffled, 0.95).unwrap(),
            historical_var(&ramp(), 0.95).unwrap()
        );
    }

    #[test]
    fn single_observation_is_its_own_var() {
        assert_eq!(historical_var(&[-0.02], 0.99).unwrap(), -0.02);
        assert_eq!(conditional_var(&[-0.02], 0.99).unwrap(), -0.02);
    }

    #[test]
    fn empty_series_is_insufficient() {
        assert!(matches!(
            historical_var(&[], 0.95),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn confidence_must_be_open_unit_interval() {
        for c in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                historical_var(&ramp(), c),
                Err(EngineError::InvalidInput(_))
            ));
        }
    }

    // ── CVaR ──

    #[test]
    fn cvar_averages_the_tail() {
        // Rank 0.07 × 20 = 1.4 → VaR = -0.086; tail = {-0.10, -0.09}
        let cvar = conditional_var(&ramp(), 0.93).unwrap();
        assert!((cvar - (-0.095)).abs() < 1e-12, "got {cvar}");
        assert!(cvar <= historical_var(&ramp(), 0.93).unwrap());
    }

    // ── Parametric ──

    #[test]
    fn parametric_var_uses_normal_quantile() {
        let returns = [0.01, -0.01, 0.02, -0.02, 0.0];
        let mu = mean(&returns);
        let sigma = sample_std(&returns);
        let var = parametric_var(&returns, 0.95).unwrap();
        // z(0.05) ≈ -1.644854
        assert!((var - (mu - 1.644_853_627 * sigma)).abs() < 1e-8, "got {var}");
    }

    #[test]
    fn parametric_var_of_constant_series_is_the_mean() {
        let var = parametric_var(&[0.003; 10], 0.99).unwrap();
        assert!((var - 0.003).abs() < 1e-15, "got {var}");
    }

    // ── Monte Carlo ──

    #[test]
    fn monte_carlo_var_approaches_parametric() {
        let returns: Vec<f64> = (0..200).map(|i| ((i * 37) % 41) as f64 / 1000.0 - 0.02).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let mc = monte_carlo_var(&returns, 0.95, 50_000, &mut rng).unwrap();
        let p = parametric_var(&returns, 0.95).unwrap();
        assert!((mc - p).abs() < 2e-3, "mc {mc} vs parametric {p}");
    }

    #[test]
    fn monte_carlo_var_is_seeded() {
        let returns = ramp();
        let a = monte_carlo_var(&returns, 0.95, 1_000, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = monte_carlo_var(&returns, 0.95, 1_000, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn monte_carlo_var_needs_simulations() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(monte_carlo_var(&ramp(), 0.95, 0, &mut rng).is_err());
    }
}
