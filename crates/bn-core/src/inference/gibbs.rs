//! Gibbs sampling.
//!
//! # Algorithm
//!
//! 1. Start from a forward sample with evidence nodes clamped.
//! 2. Pick one non-evidence node `X` uniformly at random.
//! 3. Resample `X` from its full conditional given its Markov blanket:
//!
//! ```text
//! P(X = x | mb(X)) ∝ P(x | parents(X)) × Π_{C ∈ children(X)} P(c | parents(C))
//! ```
//!
//! 4. Record the state and repeat.
//!
//! The chain is not burned in or thinned unless [`GibbsConfig`] asks for it,
//! so by default the first recorded state is the forward sample itself. The
//! conditional is evaluated in log space to stay finite for nodes with many
//! children.

use bn_common::{Error, Result};
use bn_math::{ln_or_neg_inf, log_weights_to_probabilities};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use super::sampler::{forward_sample, tally_joint, tally_marginals, Sampler};
use crate::network::BayesNet;
use crate::table::{JointProbabilityTable, MarginalProbabilityTable};

/// Chain shaping options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GibbsConfig {
    /// Steps discarded before the first recorded state.
    pub burn_in: usize,
    /// Steps taken between recorded states (at least 1).
    pub thinning: usize,
}

impl Default for GibbsConfig {
    fn default() -> Self {
        Self {
            burn_in: 0,
            thinning: 1,
        }
    }
}

impl GibbsConfig {
    /// Discard the first 10% of a run of `cycles` and keep every 5th state.
    pub fn mixing(cycles: usize) -> Self {
        Self {
            burn_in: cycles / 10,
            thinning: 5,
        }
    }
}

/// Markov-chain sampler over the non-evidence nodes.
#[derive(Debug, Clone)]
pub struct GibbsSampler<R = StdRng> {
    rng: R,
    config: GibbsConfig,
    state: Option<Vec<usize>>,
}

impl GibbsSampler<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng> GibbsSampler<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            config: GibbsConfig::default(),
            state: None,
        }
    }

    pub fn with_config(mut self, config: GibbsConfig) -> Self {
        self.config = GibbsConfig {
            thinning: config.thinning.max(1),
            ..config
        };
        self
    }

    pub fn config(&self) -> GibbsConfig {
        self.config
    }

    /// Forward sample with evidence clamped; the chain's starting point.
    pub fn initial_state(&mut self, net: &BayesNet) -> Result<Vec<usize>> {
        let order = net.topological_order();
        Ok(forward_sample(net, &order, &mut self.rng, true)?.0)
    }

    /// Forget the current chain so the next `sample` starts afresh.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Resample one randomly chosen node of `free` in place.
    ///
    /// `state` must assign every node of `net` (`ShapeMismatch`,
    /// `StateOutOfRange`) and `free` must hold node indices
    /// (`IndexOutOfRange`). If the node's full conditional has no mass (the
    /// rest of the state is impossible under the model) the node keeps its
    /// current value.
    pub fn step(&mut self, net: &BayesNet, state: &mut [usize], free: &[usize]) -> Result<()> {
        net.check_assignment(state)?;
        if let Some(&bad) = free.iter().find(|&&v| v >= net.len()) {
            return Err(Error::IndexOutOfRange {
                index: bad,
                len: net.len(),
            });
        }
        self.resample(net, state, free)
    }

    // `step` without validation, for chains this sampler built itself.
    fn resample(&mut self, net: &BayesNet, state: &mut [usize], free: &[usize]) -> Result<()> {
        if free.is_empty() {
            return Ok(());
        }
        let variable = free[self.rng.random_range(0..free.len())];
        let node = net.node(variable)?;
        let current = state[variable];

        let mut log_weights = Vec::with_capacity(node.state_count());
        for candidate in 0..node.state_count() {
            state[variable] = candidate;
            let mut lw = ln_or_neg_inf(net.node_probability_unchecked(variable, state)?);
            for &child in node.children() {
                lw += ln_or_neg_inf(net.node_probability_unchecked(child, state)?);
            }
            log_weights.push(lw);
        }
        state[variable] = current;

        match log_weights_to_probabilities(&log_weights) {
            Some(probabilities) => {
                // Non-empty and normalized, so construction cannot fail.
                if let Ok(dist) = WeightedIndex::<f64>::new(&probabilities) {
                    state[variable] = dist.sample(&mut self.rng);
                }
            }
            None => trace!(variable, "full conditional has no mass; keeping state"),
        }
        Ok(())
    }

    fn run_chain(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<Vec<usize>>> {
        let free = net.non_evidence_nodes();
        let mut state = self.initial_state(net)?;
        for _ in 0..self.config.burn_in {
            self.resample(net, &mut state, &free)?;
        }
        let mut samples = Vec::with_capacity(cycles);
        for i in 0..cycles {
            if i > 0 {
                for _ in 0..self.config.thinning {
                    self.resample(net, &mut state, &free)?;
                }
            }
            samples.push(state.clone());
        }
        debug!(
            cycles,
            burn_in = self.config.burn_in,
            thinning = self.config.thinning,
            free_nodes = free.len(),
            "gibbs chain finished"
        );
        self.state = Some(state);
        Ok(samples)
    }
}

impl<R: Rng> Sampler for GibbsSampler<R> {
    type Sample = Vec<usize>;

    /// Advance the stored chain by one recorded state, starting it on the
    /// first call.
    fn sample(&mut self, net: &BayesNet) -> Result<Vec<usize>> {
        let free = net.non_evidence_nodes();
        let state = match self.state.take() {
            Some(mut state) if state.len() == net.len() => {
                for (i, node) in net.nodes().iter().enumerate() {
                    if let Some(observed) = node.evidence() {
                        state[i] = observed;
                    }
                }
                for _ in 0..self.config.thinning {
                    self.resample(net, &mut state, &free)?;
                }
                state
            }
            _ => {
                let mut state = self.initial_state(net)?;
                for _ in 0..self.config.burn_in {
                    self.resample(net, &mut state, &free)?;
                }
                state
            }
        };
        self.state = Some(state.clone());
        Ok(state)
    }

    /// A fresh chain of `cycles` recorded states.
    fn accumulate(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<Vec<usize>>> {
        self.run_chain(net, cycles)
    }

    fn joint_table(&mut self, net: &BayesNet, cycles: usize) -> Result<JointProbabilityTable> {
        let samples = self.run_chain(net, cycles)?;
        tally_joint(net, samples.iter().map(|s| (s.as_slice(), 1.0)))
    }

    fn marginal_table(&mut self, net: &BayesNet, cycles: usize) -> Result<MarginalProbabilityTable> {
        let samples = self.run_chain(net, cycles)?;
        tally_marginals(net, samples.iter().map(|s| (s.as_slice(), 1.0)))
    }
}
