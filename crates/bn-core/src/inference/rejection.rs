//! Rejection sampling.
//!
//! Draws unconditional forward samples in topological order and discards the
//! ones that disagree with the evidence. The survivors are an unbiased sample
//! of the posterior, but the acceptance rate equals the prior probability of
//! the evidence, so rare evidence wastes most draws.

use bn_common::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::sampler::{forward_sample, tally_joint, tally_marginals, Sampler};
use crate::network::BayesNet;
use crate::table::{JointProbabilityTable, MarginalProbabilityTable};

/// Forward sampler with evidence filtering.
#[derive(Debug, Clone)]
pub struct RejectionSampler<R = StdRng> {
    rng: R,
}

impl RejectionSampler<StdRng> {
    /// Deterministic sampler for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Sampler seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> RejectionSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Draw `cycles` samples and keep only those consistent with the evidence.
    pub fn accumulate_and_discard(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<Vec<usize>>> {
        let order = net.topological_order();
        let mut kept = Vec::new();
        for _ in 0..cycles {
            let (states, _) = forward_sample(net, &order, &mut self.rng, false)?;
            if net.consistent_with_evidence(&states) {
                kept.push(states);
            }
        }
        debug!(
            cycles,
            accepted = kept.len(),
            "rejection sampling finished"
        );
        Ok(kept)
    }

    fn survivors(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<Vec<usize>>> {
        let kept = self.accumulate_and_discard(net, cycles)?;
        if kept.is_empty() {
            return Err(Error::AllSamplesRejected { cycles });
        }
        Ok(kept)
    }
}

impl<R: Rng> Sampler for RejectionSampler<R> {
    type Sample = Vec<usize>;

    /// Unconditional forward sample; evidence is ignored.
    fn sample(&mut self, net: &BayesNet) -> Result<Vec<usize>> {
        let order = net.topological_order();
        Ok(forward_sample(net, &order, &mut self.rng, false)?.0)
    }

    fn accumulate(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<Vec<usize>>> {
        let order = net.topological_order();
        (0..cycles)
            .map(|_| Ok(forward_sample(net, &order, &mut self.rng, false)?.0))
            .collect()
    }

    /// Posterior estimate from the surviving samples; fails with
    /// `AllSamplesRejected` if none survive.
    fn joint_table(&mut self, net: &BayesNet, cycles: usize) -> Result<JointProbabilityTable> {
        let kept = self.survivors(net, cycles)?;
        tally_joint(net, kept.iter().map(|s| (s.as_slice(), 1.0)))
    }

    fn marginal_table(&mut self, net: &BayesNet, cycles: usize) -> Result<MarginalProbabilityTable> {
        let kept = self.survivors(net, cycles)?;
        tally_marginals(net, kept.iter().map(|s| (s.as_slice(), 1.0)))
    }
}
