//! Maximum-likelihood CPT estimation with additive smoothing.

use bn_common::{Error, Result};
use bn_math::compensated_sum;
use tracing::debug;

use super::Dataset;
use crate::network::BayesNet;

/// Frequency counter over complete data.
///
/// Every CPT cell starts at `smoothing` pseudo-counts, each row adds one
/// count to the cell it selects, and rows are normalized at the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaximumLikelihoodLearner {
    pub smoothing: f64,
}

impl Default for MaximumLikelihoodLearner {
    fn default() -> Self {
        Self { smoothing: 1.0 }
    }
}

impl MaximumLikelihoodLearner {
    pub fn new(smoothing: f64) -> Self {
        Self { smoothing }
    }

    /// A copy of `net` with every CPT re-estimated from `data`.
    ///
    /// Structure, labels and evidence are kept. With zero smoothing, a parent
    /// configuration never seen in `data` leaves an all-zero row and fitting
    /// fails with `DegenerateNormalization`. Negative or non-finite smoothing
    /// is refused with `InvalidDistribution`.
    pub fn fit(&self, net: &BayesNet, data: &Dataset) -> Result<BayesNet> {
        if !(self.smoothing.is_finite() && self.smoothing >= 0.0) {
            return Err(Error::InvalidDistribution(format!(
                "smoothing must be a finite number >= 0, got {}",
                self.smoothing
            )));
        }
        data.validate_against(net)?;
        let mut learned = net.clone();
        for index in 0..learned.len() {
            learned.node_mut(index)?.cpt_mut().reset_probabilities(self.smoothing);
        }
        for row in data.rows() {
            for index in 0..learned.len() {
                let key = learned.parent_states(index, row)?;
                learned
                    .node_mut(index)?
                    .cpt_mut()
                    .add_to_probability(row[index], &key, 1.0)?;
            }
        }
        learned.normalize_probabilities()?;
        debug!(
            rows = data.len(),
            nodes = learned.len(),
            smoothing = self.smoothing,
            "fitted CPTs"
        );
        Ok(learned)
    }
}

/// Sum over rows of `ln P(row)` under the chain rule.
///
/// A row with zero probability makes the result negative infinity.
pub fn log_likelihood(net: &BayesNet, data: &Dataset) -> Result<f64> {
    data.validate_against(net)?;
    let terms = data
        .rows()
        .iter()
        .map(|row| net.joint_probability(row).map(f64::ln))
        .collect::<Result<Vec<_>>>()?;
    Ok(compensated_sum(&terms))
}
