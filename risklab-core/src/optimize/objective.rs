//! Portfolio objectives with analytic gradients.

use crate::portfolio::ZERO_VOLATILITY;
use crate::stats::CovarianceMatrix;

use super::problem::{dot, Objective};

/// σ(w) = sqrt(wᵀΣw)
pub struct VolatilityObjective<'a> {
    cov: &'a CovarianceMatrix,
}

impl<'a> VolatilityObjective<'a> {
    pub fn new(cov: &'a CovarianceMatrix) -> Self {
        Self { cov }
    }
}

impl Objective for VolatilityObjective<'_> {
    fn value(&self, x: &[f64]) -> f64 {
        self.cov.quad_form(x).max(0.0).sqrt()
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let sigma_x = self.cov.mul_vec(x);
        let vol = dot(&sigma_x, x).max(0.0).sqrt();
        if vol < ZERO_VOLATILITY {
            grad.fill(0.0);
            return;
        }
        for (g, s) in grad.iter_mut().zip(&sigma_x) {
            *g = s / vol;
        }
    }
}

/// −(w·μ − r_f) / σ(w)
///
/// Infinite where the volatility vanishes, so line searches never step into a
/// zero-variance corner.
pub struct NegativeSharpeObjective<'a> {
    mean: &'a [f64],
    cov: &'a CovarianceMatrix,
    risk_free_rate: f64,
}

impl<'a> NegativeSharpeObjective<'a> {
    pub fn new(mean: &'a [f64], cov: &'a CovarianceMatrix, risk_free_rate: f64) -> Self {
        Self {
            mean,
            cov,
            risk_free_rate,
        }
    }
}

impl Objective for NegativeSharpeObjective<'_> {
    fn value(&self, x: &[f64]) -> f64 {
        let vol = self.cov.quad_form(x).max(0.0).sqrt();
        if vol < ZERO_VOLATILITY {
            return f64::INFINITY;
        }
        -(dot(self.mean, x) - self.risk_free_rate) / vol
    }

    fn gradient(&self, x: &[f64], grad: &mut [f64]) {
        let sigma_x = self.cov.mul_vec(x);
        let var = dot(&sigma_x, x).max(0.0);
        let vol = var.sqrt();
        if vol < ZERO_VOLATILITY {
            grad.fill(0.0);
            return;
        }
        let excess = dot(self.mean, x) - self.risk_free_rate;
        let vol3 = var * vol;
        for ((g, m), s) in grad.iter_mut().zip(self.mean).zip(&sigma_x) {
            *g = -(m / vol - excess * s / vol3);
        }
    }
}
