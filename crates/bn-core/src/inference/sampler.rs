//! Common sampler interface and forward-sampling helpers.

use bn_common::Result;
use rand::Rng;

use crate::network::BayesNet;
use crate::table::{JointProbabilityTable, MarginalProbabilityTable};

/// A stochastic inference engine that draws full assignments from a network.
///
/// Each implementation owns its random source, which is seeded once at
/// construction and reused across calls.
pub trait Sampler {
    /// One draw: a full assignment, possibly with a weight.
    type Sample;

    /// Draw a single sample.
    fn sample(&mut self, net: &BayesNet) -> Result<Self::Sample>;

    /// Draw `cycles` samples without any filtering.
    fn accumulate(&mut self, net: &BayesNet, cycles: usize) -> Result<Vec<Self::Sample>> {
        (0..cycles).map(|_| self.sample(net)).collect()
    }

    /// Estimate the joint posterior from `cycles` draws.
    fn joint_table(&mut self, net: &BayesNet, cycles: usize) -> Result<JointProbabilityTable>;

    /// Estimate the per-node posterior marginals from `cycles` draws.
    ///
    /// The default goes through the joint table; samplers override it to
    /// avoid materializing the full product on large networks.
    fn marginal_table(&mut self, net: &BayesNet, cycles: usize) -> Result<MarginalProbabilityTable> {
        Ok(self.joint_table(net, cycles)?.marginal_table())
    }
}

/// Draw every node in `order` from its CPT given the already-drawn parents.
///
/// With `clamp_evidence`, evidence nodes are fixed to their observed state
/// and the returned weight is the product of `P(evidence | parents)`.
/// Without it, evidence is ignored and the weight is 1.
pub(crate) fn forward_sample<R: Rng + ?Sized>(
    net: &BayesNet,
    order: &[usize],
    rng: &mut R,
    clamp_evidence: bool,
) -> Result<(Vec<usize>, f64)> {
    let mut states = vec![0usize; net.len()];
    let mut weight = 1.0;
    for &index in order {
        let node = net.node(index)?;
        let key = net.parent_states(index, &states)?;
        match node.evidence() {
            Some(observed) if clamp_evidence => {
                states[index] = observed;
                weight *= node.cpt().probability(observed, &key)?;
            }
            _ => states[index] = node.cpt().sample(&key, rng)?,
        }
    }
    Ok((states, weight))
}

/// Sum weighted assignments into a joint table and normalize it.
pub(crate) fn tally_joint<'a>(
    net: &BayesNet,
    samples: impl IntoIterator<Item = (&'a [usize], f64)>,
) -> Result<JointProbabilityTable> {
    let mut table = JointProbabilityTable::new(&net.state_counts())?;
    for (states, weight) in samples {
        table.add_to_probability(states, weight)?;
    }
    table.normalize()?;
    Ok(table)
}

/// Sum weighted assignments into per-node marginals and normalize them.
pub(crate) fn tally_marginals<'a>(
    net: &BayesNet,
    samples: impl IntoIterator<Item = (&'a [usize], f64)>,
) -> Result<MarginalProbabilityTable> {
    let mut table = MarginalProbabilityTable::new(&net.state_counts());
    for (states, weight) in samples {
        for (variable, &state) in states.iter().enumerate() {
            table.add_to_probability(variable, state, weight)?;
        }
    }
    table.normalize()?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain() -> BayesNet {
        let mut net = BayesNet::new(&[2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        net.set_probabilities(0, &[], &[0.0, 1.0]).unwrap();
        net.set_probabilities(1, &[0], &[0.5, 0.5]).unwrap();
        net.set_probabilities(1, &[1], &[0.25, 0.75]).unwrap();
        net
    }

    #[test]
    fn test_forward_sample_respects_deterministic_root() {
        let net = chain();
        let order = net.topological_order();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let (states, weight) = forward_sample(&net, &order, &mut rng, false).unwrap();
            assert_eq!(states[0], 1);
            assert_eq!(weight, 1.0);
        }
    }

    #[test]
    fn test_forward_sample_clamps_and_weights() {
        let mut net = chain();
        net.set_evidence(1, 0).unwrap();
        let order = net.topological_order();
        let mut rng = StdRng::seed_from_u64(2);
        let (states, weight) = forward_sample(&net, &order, &mut rng, true).unwrap();
        assert_eq!(states, vec![1, 0]);
        assert_eq!(weight, 0.25);
    }

    #[test]
    fn test_tally_rejects_zero_weight() {
        let net = chain();
        let states = [0usize, 0];
        assert!(tally_joint(&net, [(&states[..], 0.0)]).is_err());
        assert!(tally_marginals(&net, [(&states[..], 0.0)]).is_err());
    }
}
