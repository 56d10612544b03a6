//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Optimizer weights are long-only and fully invested
//! 2. VaR ordering: VaR(99%) ≤ VaR(95%) and CVaR(c) ≤ VaR(c)
//! 3. Drawdown is never positive, and zero without losses
//! 4. Equal weighting of identical, perfectly correlated assets keeps the Sharpe ratio
//! 5. Market crash shifts VaR by exactly the shock

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use risklab_core::portfolio::{equal_weights, evaluate};
use risklab_core::risk::{conditional_var, historical_var, max_drawdown};
use risklab_core::sampler::random_weights;
use risklab_core::{
    AnnualizedStatistics, CovarianceMatrix, Optimizer, StressScenario, StressTester,
};

// ── Strategies (proptest) ────────────────────────────────────────────

/// 2-4 uncorrelated assets with distinct-enough means and variances.
fn arb_stats() -> impl Strategy<Value = AnnualizedStatistics> {
    prop::collection::vec((0.01..0.20_f64, 0.005..0.20_f64), 2..5).prop_map(|assets| {
        let symbols = (0..assets.len()).map(|i| format!("A{i}")).collect();
        let mean = assets.iter().map(|(m, _)| *m).collect();
        let variances: Vec<f64> = assets.iter().map(|(_, v)| *v).collect();
        let cov = CovarianceMatrix::diagonal(&variances).unwrap();
        AnnualizedStatistics::new(symbols, mean, cov).unwrap()
    })
}

fn arb_returns(min_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.10..0.10_f64, min_len..200)
}

fn assert_weights_valid(weights: &[f64]) -> Result<(), TestCaseError> {
    for w in weights {
        prop_assert!((0.0..=1.0).contains(w), "weight {} out of range", w);
    }
    let sum: f64 = weights.iter().sum();
    prop_assert!((sum - 1.0).abs() <= 1e-6, "sum {}", sum);
    Ok(())
}

// ── 1. Optimizer weights ─────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn min_volatility_weights_are_valid(stats in arb_stats()) {
        let p = Optimizer::new(&stats, 0.02).min_volatility();
        prop_assert!(p.is_ok(), "min volatility failed: {:?}", p.err());
        assert_weights_valid(&p.unwrap().weights)?;
    }

    #[test]
    fn max_sharpe_weights_are_valid(stats in arb_stats()) {
        let p = Optimizer::new(&stats, 0.02).max_sharpe();
        prop_assert!(p.is_ok(), "max sharpe failed: {:?}", p.err());
        assert_weights_valid(&p.unwrap().weights)?;
    }

    /// Every target between the smallest and largest mean is reachable.
    #[test]
    fn target_return_solves_inside_mean_range(stats in arb_stats(), frac in 0.0..=1.0_f64) {
        let target = stats.min_mean() + frac * (stats.max_mean() - stats.min_mean());
        let p = Optimizer::new(&stats, 0.02).target_return(target);
        prop_assert!(p.is_ok(), "target {} failed: {:?}", target, p.err());
        let p = p.unwrap();
        assert_weights_valid(&p.weights)?;
        prop_assert!((p.statistics.expected_return - target).abs() <= 1e-6);
    }

    #[test]
    fn sampled_weights_are_valid(n in 1usize..10, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        assert_weights_valid(&random_weights(n, &mut rng))?;
    }
}

// ── 2. VaR ordering ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn var_99_not_above_var_95(returns in arb_returns(20)) {
        let v95 = historical_var(&returns, 0.95).unwrap();
        let v99 = historical_var(&returns, 0.99).unwrap();
        prop_assert!(v99 <= v95, "v99 {} > v95 {}", v99, v95);
    }

    #[test]
    fn cvar_not_above_var(returns in arb_returns(1), c in 0.5..0.999_f64) {
        let var = historical_var(&returns, c).unwrap();
        let cvar = conditional_var(&returns, c).unwrap();
        prop_assert!(cvar <= var, "cvar {} > var {}", cvar, var);
    }
}

// ── 3. Drawdown ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drawdown_is_non_positive(returns in arb_returns(1)) {
        let dd = max_drawdown(&returns).unwrap();
        prop_assert!(dd <= 0.0);
        prop_assert!(dd > -1.0);
    }

    #[test]
    fn drawdown_without_losses_is_zero(returns in prop::collection::vec(0.0..0.10_f64, 1..100)) {
        prop_assert_eq!(max_drawdown(&returns).unwrap(), 0.0);
    }
}

// ── 4. Equal-weight Sharpe ───────────────────────────────────────────

proptest! {
    #[test]
    fn identical_correlated_assets_keep_sharpe(
        n in 1usize..8,
        mu in 0.0..0.3_f64,
        sigma in 0.05..0.5_f64,
    ) {
        let cov = CovarianceMatrix::new(vec![vec![sigma * sigma; n]; n]).unwrap();
        let portfolio = evaluate(&equal_weights(n), &vec![mu; n], &cov, 0.02).unwrap();
        let single = (mu - 0.02) / sigma;
        prop_assert!((portfolio.sharpe_ratio - single).abs() < 1e-9,
            "portfolio {} vs single {}", portfolio.sharpe_ratio, single);
    }
}

// ── 5. Market crash ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn market_crash_shifts_var_by_shock(r in -0.05..0.05_f64, len in 20usize..100) {
        let returns = vec![r; len];
        let mut rng = StdRng::seed_from_u64(0);
        let result = StressTester::default()
            .run_scenario(&returns, StressScenario::market_crash(), &mut rng)
            .unwrap();
        prop_assert!((result.var_95 - (r - 0.30)).abs() < 1e-12);
    }
}
