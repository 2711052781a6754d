//! Probability-vector helpers shared by the table types.
//!
//! All functions here operate on plain `f64` slices. Normalization follows a
//! single degenerate-input policy: a vector whose total is zero, negative or
//! non-finite is reported as `None` and left untouched, so callers never see
//! the NaN that naive division would produce.

/// Sum with Neumaier compensation.
///
/// Joint tables can hold millions of tiny cells; plain accumulation loses
/// several digits there.
pub fn compensated_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for &v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

/// Divide every entry by the compensated sum.
///
/// Returns the normalizer on success. Returns `None` without mutating when
/// the total is not a positive finite number.
pub fn normalize_in_place(values: &mut [f64]) -> Option<f64> {
    let total = compensated_sum(values);
    normalize_by(values, total)
}

/// Divide every entry by `alpha`.
///
/// Returns `None` without mutating when `alpha` is not a positive finite
/// number.
pub fn normalize_by(values: &mut [f64], alpha: f64) -> Option<f64> {
    if !alpha.is_finite() || alpha <= 0.0 {
        return None;
    }
    for v in values.iter_mut() {
        *v /= alpha;
    }
    Some(alpha)
}

/// Index of the largest entry; ties resolve to the first index.
///
/// Empty input yields 0. NaN entries never win.
pub fn argmax_first(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] || (values[best].is_nan() && !v.is_nan()) {
            best = i;
        }
    }
    best
}

/// Total-variation distance `0.5 * sum |p - q|`.
///
/// Slices of different lengths compare over the shorter prefix.
pub fn total_variation(p: &[f64], q: &[f64]) -> f64 {
    0.5 * p
        .iter()
        .zip(q.iter())
        .map(|(a, b)| (a - b).abs())
        .sum::<f64>()
}

/// True when every entry is finite and non-negative and the total is a
/// positive finite number.
pub fn is_valid_weights(values: &[f64]) -> bool {
    if !values.iter().all(|v| v.is_finite() && *v >= 0.0) {
        return false;
    }
    let total = compensated_sum(values);
    total.is_finite() && total > 0.0
}
