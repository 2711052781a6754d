//! Kim-Pearl belief propagation for singly-connected networks.
//!
//! # Background
//!
//! In a polytree every node `X` separates the evidence above it (reachable
//! through its parents) from the evidence below it (reachable through its
//! children). The posterior factors as
//!
//! ```text
//! BEL(x) = α · λ(x) · π(x)
//! λ(x)   = Π_{Y ∈ children(X)} λ_Y(x)
//! π(x)   = Σ_{u} P(x | u) · Π_{U_i ∈ parents(X)} π_X(u_i)
//! ```
//!
//! where the messages are
//!
//! ```text
//! π_X(z)  = π(z) · Π_{C ∈ children(Z), C ≠ X} λ_C(z)            (Z → X)
//! λ_Y(x)  = Σ_y λ(y) Σ_{u : u_X = x} P(y | u) Π_{U ≠ X} π_Y(u_U)  (Y → X)
//! ```
//!
//! # Algorithm
//!
//! 1. [`BeliefPropagator::initial_tree`]: parentless nodes take their prior
//!    as π, everything else starts at π = λ = 1; evidence nodes are clamped
//!    to an indicator of the observed state.
//! 2. [`BeliefPropagator::update_tree`]: one sweep. Walk the topological
//!    order forward over every node, then backward from the first evidence
//!    node (or the last node when there is no evidence) to the start,
//!    recomputing λ, then π, then the belief of each non-evidence node.
//! 3. [`BeliefPropagator::propagate`]: initialize and repeat sweeps until no
//!    belief moves by more than the convergence threshold. On a polytree this
//!    reaches the exact posterior within a handful of sweeps.
//!
//! On multiply-connected networks the message recursion is cut wherever a
//! message would depend on itself and the result is an approximation.
//!
//! Evidence the model gives probability zero leaves some node with no
//! belief mass; the sweep stops there with `DegenerateNormalization`.
//!
//! # Example
//!
//! ```rust
//! use bn_core::inference::belief_prop::{BeliefPropConfig, BeliefPropagator};
//! use bn_core::network::BayesNet;
//!
//! let mut net = BayesNet::new(&[2, 2]).unwrap();
//! net.add_edge(0, 1).unwrap();
//! net.set_probabilities(1, &[0], &[0.9, 0.1]).unwrap();
//! net.set_probabilities(1, &[1], &[0.2, 0.8]).unwrap();
//! net.set_evidence(1, 1).unwrap();
//!
//! let mut propagator = BeliefPropagator::new(BeliefPropConfig::default());
//! let result = propagator.propagate(&net).unwrap();
//! assert!(result.converged);
//! assert!((propagator.belief(0, 1).unwrap() - 0.4 / 0.45).abs() < 1e-12);
//! ```

use bn_common::{Error, Result};
use bn_math::{normalize_in_place, total_variation};
use tracing::{debug, warn};

use crate::network::BayesNet;
use crate::table::{JointProbabilityTable, MarginalProbabilityTable};

/// Configuration for belief propagation.
#[derive(Debug, Clone)]
pub struct BeliefPropConfig {
    /// Maximum sweeps run by [`BeliefPropagator::propagate`].
    pub max_iterations: usize,
    /// Largest per-node total-variation change in belief still counted as
    /// converged.
    pub convergence_threshold: f64,
    /// Refuse multiply-connected networks instead of warning.
    pub strict_topology: bool,
}

impl Default for BeliefPropConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_threshold: 1e-9,
            strict_topology: false,
        }
    }
}

impl BeliefPropConfig {
    /// Only accept polytrees.
    pub fn strict() -> Self {
        Self {
            strict_topology: true,
            ..Default::default()
        }
    }

    /// A single sweep after initialization.
    pub fn single_sweep() -> Self {
        Self {
            max_iterations: 1,
            ..Default::default()
        }
    }
}

/// Belief, π-value and λ-value of one state of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateParameters {
    pub belief: f64,
    pub pi_value: f64,
    pub lambda_value: f64,
}

impl StateParameters {
    fn clamped(on: bool) -> Self {
        let v = if on { 1.0 } else { 0.0 };
        Self {
            belief: v,
            pi_value: v,
            lambda_value: v,
        }
    }
}

/// Result of [`BeliefPropagator::propagate`].
#[derive(Debug, Clone)]
pub struct BeliefPropResult {
    /// Posterior marginal of every node.
    pub marginals: MarginalProbabilityTable,
    /// Sweeps performed.
    pub iterations: usize,
    /// Whether the last sweep moved no belief more than the threshold.
    pub converged: bool,
    /// Largest total-variation change in the last sweep.
    pub max_change: f64,
    /// Whether the network was a polytree (exact result).
    pub singly_connected: bool,
}

/// Kim-Pearl propagator. Holds the per-node parameter table between calls.
#[derive(Debug, Clone, Default)]
pub struct BeliefPropagator {
    config: BeliefPropConfig,
    parameters: Vec<Vec<StateParameters>>,
}

// Read-only view used by the mutually recursive message functions.
struct Messages<'a> {
    net: &'a BayesNet,
    parameters: &'a [Vec<StateParameters>],
}

impl Messages<'_> {
    /// π message from parent `z` (in state `z_state`) to its child `x`.
    fn pi(&self, z: usize, z_state: usize, x: usize, active: &mut Vec<(usize, usize)>) -> f64 {
        let mut value = self.parameters[z][z_state].pi_value;
        for &child in self.net.nodes()[z].children() {
            if child != x {
                value *= self.lambda(child, z, z_state, active);
            }
        }
        value
    }

    /// λ message from child `y` to its parent `x` (in state `x_state`).
    ///
    /// `active` holds the (child, parent) messages currently on the call
    /// stack; re-entering one returns the neutral value 1.
    fn lambda(&self, y: usize, x: usize, x_state: usize, active: &mut Vec<(usize, usize)>) -> f64 {
        let node = &self.net.nodes()[y];
        let parents = node.parents();
        let Some(position) = parents.iter().position(|&p| p == x) else {
            return 1.0;
        };
        if active.contains(&(y, x)) {
            return 1.0;
        }
        active.push((y, x));

        let cpt = node.cpt();
        let mut total = 0.0;
        for row_index in cpt.find_parent_state(position, x_state) {
            let Some(row) = cpt.row(row_index) else {
                continue;
            };
            let mut incoming = 1.0;
            for (j, &parent) in parents.iter().enumerate() {
                if parent != x {
                    incoming *= self.pi(parent, row.parent_states[j], y, active);
                }
            }
            if incoming == 0.0 {
                continue;
            }
            for (y_state, p) in row.probabilities.iter().enumerate() {
                total += self.parameters[y][y_state].lambda_value * p * incoming;
            }
        }

        active.pop();
        total
    }

    /// λ(x = state): product of the λ messages from every child of `x`.
    fn lambda_value(&self, x: usize, state: usize, active: &mut Vec<(usize, usize)>) -> f64 {
        self.net.nodes()[x]
            .children()
            .iter()
            .map(|&child| self.lambda(child, x, state, active))
            .product()
    }

    /// Unnormalized π(x) for every state of `x`. A parentless node gets its
    /// prior.
    fn pi_values(&self, x: usize, active: &mut Vec<(usize, usize)>) -> Vec<f64> {
        let node = &self.net.nodes()[x];
        let mut pis = vec![0.0; node.state_count()];
        for row in node.cpt().rows() {
            let incoming: f64 = node
                .parents()
                .iter()
                .zip(&row.parent_states)
                .map(|(&parent, &state)| self.pi(parent, state, x, active))
                .product();
            if incoming == 0.0 {
                continue;
            }
            for (pi, p) in pis.iter_mut().zip(row.probabilities) {
                *pi += p * incoming;
            }
        }
        pis
    }
}

impl BeliefPropagator {
    /// Create a new belief propagator.
    pub fn new(config: BeliefPropConfig) -> Self {
        Self {
            config,
            parameters: Vec::new(),
        }
    }

    pub fn config(&self) -> &BeliefPropConfig {
        &self.config
    }

    /// Build the parameter table for `net` and clamp evidence.
    ///
    /// Checks the topology first: a multiply-connected network is an error
    /// under `strict_topology` and a warning otherwise.
    pub fn initial_tree(&mut self, net: &BayesNet) -> Result<()> {
        if !net.is_singly_connected() {
            if self.config.strict_topology {
                return Err(Error::NotSinglyConnected);
            }
            warn!(
                nodes = net.len(),
                "network is not singly connected; beliefs will be approximate"
            );
        }

        self.parameters = net
            .nodes()
            .iter()
            .map(|node| -> Result<Vec<StateParameters>> {
                if let Some(observed) = node.evidence() {
                    return Ok((0..node.state_count())
                        .map(|s| StateParameters::clamped(s == observed))
                        .collect());
                }
                let prior = node
                    .parents()
                    .is_empty()
                    .then(|| node.cpt().probabilities(&[]).ok())
                    .flatten();
                let mut states: Vec<StateParameters> = (0..node.state_count())
                    .map(|s| StateParameters {
                        belief: 0.0,
                        pi_value: prior.map_or(1.0, |row| row[s]),
                        lambda_value: 1.0,
                    })
                    .collect();
                update_belief(node.index(), &mut states)?;
                Ok(states)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn check_initialized(&self, net: &BayesNet) -> Result<()> {
        let matches = self.parameters.len() == net.len()
            && self
                .parameters
                .iter()
                .zip(net.nodes())
                .all(|(p, n)| p.len() == n.state_count());
        if matches {
            Ok(())
        } else {
            Err(Error::NotInitialized(format!(
                "parameter table covers {} nodes; network has {}",
                self.parameters.len(),
                net.len()
            )))
        }
    }

    fn messages<'a>(&'a self, net: &'a BayesNet) -> Messages<'a> {
        Messages {
            net,
            parameters: &self.parameters,
        }
    }

    // Recompute λ, π and belief for one non-evidence node. An evidence node
    // keeps its clamp but its observed state must still carry mass.
    fn recompute(&mut self, net: &BayesNet, x: usize) -> Result<()> {
        let node = &net.nodes()[x];
        let mut active = Vec::new();

        if let Some(observed) = node.evidence() {
            let messages = self.messages(net);
            let mass = messages.lambda_value(x, observed, &mut active)
                * messages.pi_values(x, &mut active)[observed];
            return if mass > 0.0 {
                Ok(())
            } else {
                Err(impossible_evidence(x))
            };
        }

        let lambdas: Vec<f64> = {
            let messages = self.messages(net);
            (0..node.state_count())
                .map(|state| messages.lambda_value(x, state, &mut active))
                .collect()
        };
        for (p, l) in self.parameters[x].iter_mut().zip(&lambdas) {
            p.lambda_value = *l;
        }

        if !node.parents().is_empty() {
            let mut pis = self.messages(net).pi_values(x, &mut active);
            normalize_in_place(&mut pis);
            for (p, pi) in self.parameters[x].iter_mut().zip(&pis) {
                p.pi_value = *pi;
            }
        }

        update_belief(x, &mut self.parameters[x])
    }

    /// One forward and one backward sweep over the topological order.
    ///
    /// Fails with `NotInitialized` unless [`initial_tree`](Self::initial_tree)
    /// ran on a network of the same shape.
    pub fn update_tree(&mut self, net: &BayesNet) -> Result<()> {
        self.check_initialized(net)?;
        let order = net.topological_order();
        let pivot = order
            .iter()
            .position(|&n| net.nodes()[n].is_evidence())
            .unwrap_or(order.len().saturating_sub(1));

        for &x in &order {
            self.recompute(net, x)?;
        }
        for &x in order.iter().take(pivot + 1).rev() {
            self.recompute(net, x)?;
        }
        Ok(())
    }

    /// Initialize, then sweep until beliefs stop moving.
    pub fn propagate(&mut self, net: &BayesNet) -> Result<BeliefPropResult> {
        self.initial_tree(net)?;
        let singly_connected = net.is_singly_connected();
        let mut iterations = 0;
        let mut max_change = 0.0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let before = self.beliefs_snapshot();
            self.update_tree(net)?;
            iterations += 1;
            max_change = before
                .iter()
                .zip(&self.parameters)
                .map(|(old, new)| {
                    let new: Vec<f64> = new.iter().map(|p| p.belief).collect();
                    total_variation(old, &new)
                })
                .fold(0.0, f64::max);
            if max_change < self.config.convergence_threshold {
                converged = true;
                break;
            }
        }

        debug!(
            iterations,
            converged,
            max_change,
            singly_connected,
            "belief propagation finished"
        );
        Ok(BeliefPropResult {
            marginals: self.marginal_table(),
            iterations,
            converged,
            max_change,
            singly_connected,
        })
    }

    fn beliefs_snapshot(&self) -> Vec<Vec<f64>> {
        self.parameters
            .iter()
            .map(|states| states.iter().map(|p| p.belief).collect())
            .collect()
    }

    /// Parameters of every state of `node`.
    pub fn parameters(&self, node: usize) -> Result<&[StateParameters]> {
        self.parameters
            .get(node)
            .map(Vec::as_slice)
            .ok_or(Error::IndexOutOfRange {
                index: node,
                len: self.parameters.len(),
            })
    }

    /// Current belief `BEL(node = state)`.
    pub fn belief(&self, node: usize, state: usize) -> Result<f64> {
        let states = self.parameters(node)?;
        states
            .get(state)
            .map(|p| p.belief)
            .ok_or(Error::StateOutOfRange {
                node,
                state,
                state_count: states.len(),
            })
    }

    /// Current beliefs of every node.
    pub fn marginal_table(&self) -> MarginalProbabilityTable {
        MarginalProbabilityTable::from_rows(self.beliefs_snapshot())
    }

    /// A correctly sized, all-zero joint table.
    ///
    /// The propagator only computes marginals; joint entries are not
    /// populated. Use [`marginal_table`](Self::marginal_table) for results.
    pub fn joint_table(&self, net: &BayesNet) -> Result<JointProbabilityTable> {
        JointProbabilityTable::new(&net.state_counts())
    }
}

fn impossible_evidence(node: usize) -> Error {
    Error::DegenerateNormalization(format!(
        "node {node} has no belief mass; the evidence is impossible under the model"
    ))
}

// belief = normalize(π · λ)
fn update_belief(node: usize, states: &mut [StateParameters]) -> Result<()> {
    let mut beliefs: Vec<f64> = states.iter().map(|p| p.pi_value * p.lambda_value).collect();
    if normalize_in_place(&mut beliefs).is_none() {
        return Err(impossible_evidence(node));
    }
    for (p, b) in states.iter_mut().zip(beliefs) {
        p.belief = b;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f64], b: &[f64], tol: f64) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    fn beliefs(bp: &BeliefPropagator, node: usize) -> Vec<f64> {
        bp.parameters(node).unwrap().iter().map(|p| p.belief).collect()
    }

    /// A -> B -> C with distinct CPTs.
    fn chain() -> BayesNet {
        let mut net = BayesNet::new(&[2, 2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        net.add_edge(1, 2).unwrap();
        net.set_probabilities(0, &[], &[0.3, 0.7]).unwrap();
        net.set_probabilities(1, &[0], &[0.9, 0.1]).unwrap();
        net.set_probabilities(1, &[1], &[0.4, 0.6]).unwrap();
        net.set_probabilities(2, &[0], &[0.7, 0.3]).unwrap();
        net.set_probabilities(2, &[1], &[0.1, 0.9]).unwrap();
        net
    }

    fn exact(net: &BayesNet, node: usize) -> Vec<f64> {
        let joint = net.joint_table().unwrap();
        let mut m = vec![0.0; net.node(node).unwrap().state_count()];
        for (assignment, p) in joint.iter() {
            if net.consistent_with_evidence(&assignment) {
                m[assignment[node]] += p;
            }
        }
        let total: f64 = m.iter().sum();
        m.iter().map(|x| x / total).collect()
    }

    #[test]
    fn test_config_default() {
        let config = BeliefPropConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert!(!config.strict_topology);
        assert!(BeliefPropConfig::strict().strict_topology);
        assert_eq!(BeliefPropConfig::single_sweep().max_iterations, 1);
    }

    #[test]
    fn test_initial_tree_priors_and_clamps() {
        let mut net = chain();
        net.set_evidence(2, 1).unwrap();
        let mut bp = BeliefPropagator::default();
        bp.initial_tree(&net).unwrap();

        let root = bp.parameters(0).unwrap();
        assert_eq!(root[1].pi_value, 0.7);
        assert_eq!(root[1].lambda_value, 1.0);
        assert!((root[1].belief - 0.7).abs() < 1e-12);

        let middle = bp.parameters(1).unwrap();
        assert!(middle.iter().all(|p| p.pi_value == 1.0 && p.lambda_value == 1.0));

        let leaf = bp.parameters(2).unwrap();
        assert_eq!(leaf[0], StateParameters::clamped(false));
        assert_eq!(leaf[1], StateParameters::clamped(true));
    }

    #[test]
    fn test_update_before_initial_fails() {
        let net = chain();
        let mut bp = BeliefPropagator::default();
        assert!(matches!(
            bp.update_tree(&net),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn test_no_evidence_gives_prior_marginals() {
        let net = chain();
        let mut bp = BeliefPropagator::default();
        bp.propagate(&net).unwrap();
        for node in 0..3 {
            assert!(approx(&beliefs(&bp, node), &exact(&net, node), 1e-12));
        }
    }

    #[test]
    fn test_leaf_evidence_flows_up_chain() {
        let mut net = chain();
        net.set_evidence(2, 1).unwrap();
        let mut bp = BeliefPropagator::default();
        let result = bp.propagate(&net).unwrap();
        assert!(result.converged);
        assert!(result.singly_connected);
        for node in 0..2 {
            assert!(approx(&beliefs(&bp, node), &exact(&net, node), 1e-12));
        }
    }

    #[test]
    fn test_middle_evidence() {
        let mut net = chain();
        net.set_evidence(1, 0).unwrap();
        let mut bp = BeliefPropagator::default();
        bp.propagate(&net).unwrap();
        assert!(approx(&beliefs(&bp, 0), &exact(&net, 0), 1e-12));
        assert!(approx(&beliefs(&bp, 2), &[0.7, 0.3], 1e-12));
    }

    #[test]
    fn test_evidence_beliefs_stay_clamped() {
        let mut net = chain();
        net.set_evidence(0, 1).unwrap();
        let mut bp = BeliefPropagator::default();
        bp.propagate(&net).unwrap();
        assert_eq!(beliefs(&bp, 0), vec![0.0, 1.0]);
    }

    #[test]
    fn test_explaining_away_polytree() {
        // Two causes of one effect.
        let mut net = BayesNet::new(&[2, 2, 2]).unwrap();
        net.add_edge(0, 2).unwrap();
        net.add_edge(1, 2).unwrap();
        net.set_probabilities(0, &[], &[0.8, 0.2]).unwrap();
        net.set_probabilities(1, &[], &[0.9, 0.1]).unwrap();
        net.set_probabilities(2, &[0, 0], &[0.99, 0.01]).unwrap();
        net.set_probabilities(2, &[0, 1], &[0.2, 0.8]).unwrap();
        net.set_probabilities(2, &[1, 0], &[0.3, 0.7]).unwrap();
        net.set_probabilities(2, &[1, 1], &[0.05, 0.95]).unwrap();
        net.set_evidence(2, 1).unwrap();

        let mut bp = BeliefPropagator::default();
        bp.propagate(&net).unwrap();
        let with_effect = beliefs(&bp, 0);
        assert!(approx(&with_effect, &exact(&net, 0), 1e-12));

        net.set_evidence(1, 1).unwrap();
        bp.propagate(&net).unwrap();
        let explained = beliefs(&bp, 0);
        assert!(approx(&explained, &exact(&net, 0), 1e-12));
        assert!(explained[1] < with_effect[1]);
    }

    /// A -> B where B = 1 never happens.
    fn never_one() -> BayesNet {
        let mut net = BayesNet::new(&[2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        net.set_probabilities(1, &[0], &[1.0, 0.0]).unwrap();
        net.set_probabilities(1, &[1], &[1.0, 0.0]).unwrap();
        net
    }

    #[test]
    fn test_impossible_evidence_is_an_error() {
        let mut net = never_one();
        net.set_evidence(1, 1).unwrap();
        let mut bp = BeliefPropagator::default();
        assert!(matches!(
            bp.propagate(&net),
            Err(Error::DegenerateNormalization(_))
        ));
    }

    #[test]
    fn test_contradiction_between_evidence_nodes_is_an_error() {
        let mut net = never_one();
        net.set_evidence(0, 0).unwrap();
        net.set_evidence(1, 1).unwrap();
        let mut bp = BeliefPropagator::default();
        assert!(matches!(
            bp.propagate(&net),
            Err(Error::DegenerateNormalization(_))
        ));
    }

    #[test]
    fn test_possible_evidence_on_every_node() {
        let mut net = never_one();
        net.set_evidence(0, 1).unwrap();
        net.set_evidence(1, 0).unwrap();
        let mut bp = BeliefPropagator::default();
        let result = bp.propagate(&net).unwrap();
        assert_eq!(result.marginals.variable(0).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_strict_topology_rejects_loop() {
        let mut net = BayesNet::new(&[2, 2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        net.add_edge(0, 2).unwrap();
        net.add_edge(1, 2).unwrap();
        let mut bp = BeliefPropagator::new(BeliefPropConfig::strict());
        assert!(matches!(
            bp.propagate(&net),
            Err(Error::NotSinglyConnected)
        ));
        let mut lenient = BeliefPropagator::default();
        let result = lenient.propagate(&net).unwrap();
        assert!(!result.singly_connected);
    }

    #[test]
    fn test_joint_table_is_sized_placeholder() {
        let net = chain();
        let mut bp = BeliefPropagator::default();
        bp.propagate(&net).unwrap();
        let joint = bp.joint_table(&net).unwrap();
        assert_eq!(joint.len(), 8);
        assert_eq!(joint.total(), 0.0);
    }

    #[test]
    fn test_belief_bounds() {
        let net = chain();
        let mut bp = BeliefPropagator::default();
        bp.propagate(&net).unwrap();
        assert!(bp.belief(0, 2).is_err());
        assert!(bp.belief(3, 0).is_err());
    }

    #[test]
    fn test_marginal_table_matches_parameters() {
        let mut net = chain();
        net.set_evidence(2, 0).unwrap();
        let mut bp = BeliefPropagator::default();
        let result = bp.propagate(&net).unwrap();
        for node in 0..3 {
            assert_eq!(result.marginals.variable(node).unwrap(), beliefs(&bp, node).as_slice());
        }
    }
}
