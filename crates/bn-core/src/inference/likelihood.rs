//! Likelihood-weighted sampling.
//!
//! Evidence nodes are clamped to their observed state during the forward
//! pass instead of being sampled. Each draw carries the weight
//! `prod P(e_i | parents(e_i))` over the evidence nodes, which corrects for
//! the clamping. No draw is wasted, but weights degenerate when evidence sits
//! far downstream of unlikely causes.

use bn_common::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::sampler::{forward_sample, tally_joint, tally_marginals, Sampler};
use crate::network::BayesNet;
use crate::table::{JointProbabilityTable, MarginalProbabilityTable};

/// A full assignment and its importance weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSample {
    pub states: Vec<usize>,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct LikelihoodWeightedSampler<R = StdRng> {
    rng: R,
}

impl LikelihoodWeightedSampler<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> LikelihoodWeightedSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

fn log_weight_summary(samples: &[WeightedSample]) {
    let total: f64 = samples.iter().map(|s| s.weight).sum();
    let zero = samples.iter().filter(|s| s.weight == 0.0).count();
    debug!(
        cycles = samples.len(),
        total_weight = total,
        zero_weight = zero,
        "likelihood weighting finished"
    );
}

impl<R: Rng> Sampler for LikelihoodWeightedSampler<R> {
    type Sample = WeightedSample;

    fn sample(&mut self, net: &BayesNet) -> Result<WeightedSample> {
        let order = net.topological_order();
        let (states, weight) = forward_sample(net, &order, &mut self.rng, true)?;
        Ok(WeightedSample { states, weight })
    }

    fn accumulate(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<WeightedSample>> {
        let order = net.topological_order();
        (0..cycles)
            .map(|_| {
                let (states, weight) = forward_sample(net, &order, &mut self.rng, true)?;
                Ok(WeightedSample { states, weight })
            })
            .collect()
    }

    /// Weighted posterior estimate. If every weight is zero the evidence is
    /// impossible under the model and normalization fails.
    fn joint_table(&mut self, net: &BayesNet, cycles: usize) -> Result<JointProbabilityTable> {
        let samples = self.accumulate(net, cycles)?;
        log_weight_summary(&samples);
        tally_joint(net, samples.iter().map(|s| (s.states.as_slice(), s.weight)))
    }

    fn marginal_table(&mut self, net: &BayesNet, cycles: usize) -> Result<MarginalProbabilityTable> {
        let samples = self.accumulate(net, cycles)?;
        log_weight_summary(&samples);
        tally_marginals(net, samples.iter().map(|s| (s.states.as_slice(), s.weight)))
    }
}
