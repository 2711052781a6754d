//! Numerically stable primitives for log-domain probability math.

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Convert unnormalized log-weights into a probability vector.
///
/// Subtracts the log normalizer before exponentiating so products of many
/// small factors do not underflow. Returns `None` when every weight is
/// -inf (zero mass) or any weight is NaN.
pub fn log_weights_to_probabilities(log_weights: &[f64]) -> Option<Vec<f64>> {
    let log_z = log_sum_exp(log_weights);
    if !log_z.is_finite() {
        return None;
    }
    Some(log_weights.iter().map(|w| (w - log_z).exp()).collect())
}

/// Natural log that maps zero to -inf instead of producing a NaN path.
///
/// Negative inputs still yield NaN.
#[inline]
pub fn ln_or_neg_inf(p: f64) -> f64 {
    if p == 0.0 {
        f64::NEG_INFINITY
    } else {
        p.ln()
    }
}
