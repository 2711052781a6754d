//! Property-based tests for bn-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use bn_math::{
    argmax_first, compensated_sum, log_sum_exp, log_weights_to_probabilities,
    normalize_in_place, total_variation,
};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_sum_exp properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// log_sum_exp is commutative: order doesn't matter.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        prop_assert!(approx_eq(log_sum_exp(&[a, b]), log_sum_exp(&[b, a]), TOL));
    }

    /// log_sum_exp is never below the maximum input.
    #[test]
    fn log_sum_exp_dominates_max(values in prop::collection::vec(-500.0..500.0f64, 1..20)) {
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(log_sum_exp(&values) >= max - TOL);
    }
}

// ============================================================================
// Probability-vector properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Normalizing a vector with positive mass yields a distribution.
    #[test]
    fn normalize_yields_distribution(mut values in prop::collection::vec(0.0..10.0f64, 1..32)) {
        prop_assume!(values.iter().any(|v| *v > 0.0));
        let before = values.clone();
        let alpha = normalize_in_place(&mut values);
        prop_assert!(alpha.is_some());
        prop_assert!(approx_eq(compensated_sum(&values), 1.0, 1e-12));
        // Ratios are preserved.
        let alpha = alpha.unwrap_or(1.0);
        for (v, b) in values.iter().zip(before.iter()) {
            prop_assert!(approx_eq(v * alpha, *b, 1e-9));
        }
    }

    /// The arg-max is never dominated by any other entry.
    #[test]
    fn argmax_is_maximal(values in prop::collection::vec(0.0..1.0f64, 1..16)) {
        let i = argmax_first(&values);
        prop_assert!(values.iter().all(|v| *v <= values[i]));
        prop_assert!(values[..i].iter().all(|v| *v < values[i]));
    }

    /// Total variation is a symmetric distance bounded by 1 on distributions.
    #[test]
    fn total_variation_symmetric_bounded(
        mut p in prop::collection::vec(0.01..1.0f64, 2..8),
        seed in prop::collection::vec(0.01..1.0f64, 8),
    ) {
        let mut q: Vec<f64> = seed[..p.len()].to_vec();
        normalize_in_place(&mut p);
        normalize_in_place(&mut q);
        let d = total_variation(&p, &q);
        prop_assert!(approx_eq(d, total_variation(&q, &p), TOL));
        prop_assert!((0.0..=1.0 + TOL).contains(&d));
    }

    /// Converting log-weights matches direct normalization of the weights.
    #[test]
    fn log_weights_match_direct(values in prop::collection::vec(0.001..1.0f64, 1..16)) {
        let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
        let from_logs = log_weights_to_probabilities(&logs);
        prop_assert!(from_logs.is_some());
        let mut direct = values.clone();
        normalize_in_place(&mut direct);
        for (a, b) in from_logs.unwrap_or_default().iter().zip(direct.iter()) {
            prop_assert!(approx_eq(*a, *b, 1e-9));
        }
    }
}
