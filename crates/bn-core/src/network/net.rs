//! The network arena: nodes addressed by index, edges, evidence and the graph
//! algorithms the inference engines rely on.
//!
//! # Structure
//!
//! Nodes live in a `Vec` and are identified by their position. Each node owns
//! its out-edges (`children`) and a reverse-adjacency list (`parents`) kept in
//! edge-insertion order. The CPT of a node is keyed by its parents' states in
//! that same order.
//!
//! # Example
//!
//! ```
//! use bn_core::network::BayesNet;
//!
//! let mut net = BayesNet::new(&[2, 2]).unwrap();
//! assert!(net.add_edge(0, 1).unwrap());
//! net.set_probabilities(1, &[0], &[0.9, 0.1]).unwrap();
//! net.set_probabilities(1, &[1], &[0.2, 0.8]).unwrap();
//! assert_eq!(net.topological_order(), vec![0, 1]);
//! assert!((net.joint_probability(&[1, 1]).unwrap() - 0.4).abs() < 1e-12);
//! ```

use std::collections::VecDeque;

use bn_common::{Error, Result};
use rand::Rng;
use tracing::{debug, trace};

use super::node::{BayesNode, TraversalMark};
use crate::table::{JointProbabilityTable, StateOdometer};

/// A directed acyclic network of discrete variables.
#[derive(Debug, Clone, PartialEq)]
pub struct BayesNet {
    nodes: Vec<BayesNode>,
}

impl BayesNet {
    /// Create unconnected nodes with the given cardinalities and uniform
    /// priors. Every cardinality must be at least 2.
    pub fn new(state_counts: &[usize]) -> Result<Self> {
        let nodes = state_counts
            .iter()
            .enumerate()
            .map(|(i, &n)| BayesNode::new(i, n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.nodes.len(),
            })
        }
    }

    pub fn node(&self, index: usize) -> Result<&BayesNode> {
        self.check(index)?;
        Ok(&self.nodes[index])
    }

    pub fn node_mut(&mut self, index: usize) -> Result<&mut BayesNode> {
        self.check(index)?;
        Ok(&mut self.nodes[index])
    }

    pub fn nodes(&self) -> &[BayesNode] {
        &self.nodes
    }

    /// Cardinality of every node, in index order.
    pub fn state_counts(&self) -> Vec<usize> {
        self.nodes.iter().map(BayesNode::state_count).collect()
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Add the edge `parent -> child`.
    ///
    /// Returns `Ok(false)` without touching anything for a self-loop or an
    /// edge that already exists. On success the child's CPT gains a parent
    /// dimension and is rebuilt at uniform values, so any probabilities set
    /// on the child earlier are lost.
    ///
    /// Edges that would close a directed cycle are refused with
    /// `CycleDetected`, and a parent that would grow the child's CPT past
    /// [`MAX_TABLE_CELLS`](crate::table::odometer::MAX_TABLE_CELLS) with
    /// `TableTooLarge`. Either way the network is unchanged.
    pub fn add_edge(&mut self, parent: usize, child: usize) -> Result<bool> {
        self.check(parent)?;
        self.check(child)?;
        if parent == child || self.has_edge(parent, child) {
            return Ok(false);
        }
        if self.reaches(child, parent) {
            debug!(parent, child, "refusing edge that closes a cycle");
            return Err(Error::CycleDetected { parent, child });
        }
        let parent_states = self.nodes[parent].state_count();
        self.nodes[child].push_parent(parent, parent_states)?;
        self.nodes[parent].push_child(child);
        trace!(parent, child, "edge added");
        Ok(true)
    }

    /// Remove the edge `parent -> child`.
    ///
    /// Returns `Ok(false)` if there was no such edge. The child's CPT loses
    /// the parent dimension and is rebuilt at uniform values.
    pub fn remove_edge(&mut self, parent: usize, child: usize) -> Result<bool> {
        self.check(parent)?;
        self.check(child)?;
        if !self.nodes[parent].remove_child(child) {
            return Ok(false);
        }
        self.nodes[child].remove_parent(parent)?;
        trace!(parent, child, "edge removed");
        Ok(true)
    }

    pub fn has_edge(&self, parent: usize, child: usize) -> bool {
        self.nodes
            .get(parent)
            .is_some_and(|n| n.children().contains(&child))
    }

    /// Parents of `index` in edge-insertion order (the CPT key order).
    pub fn in_edges(&self, index: usize) -> Result<&[usize]> {
        Ok(self.node(index)?.parents())
    }

    /// Children of `index` in edge-insertion order.
    pub fn out_edges(&self, index: usize) -> Result<&[usize]> {
        Ok(self.node(index)?.children())
    }

    /// A node with no in-edges and at least one out-edge.
    ///
    /// An isolated node is neither a root nor a leaf.
    pub fn is_root(&self, index: usize) -> Result<bool> {
        let node = self.node(index)?;
        Ok(node.parents().is_empty() && !node.children().is_empty())
    }

    /// A node with at least one in-edge and no out-edges.
    pub fn is_leaf(&self, index: usize) -> Result<bool> {
        let node = self.node(index)?;
        Ok(!node.parents().is_empty() && node.children().is_empty())
    }

    // True if `to` is reachable from `from` along directed edges.
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut seen[current], true) {
                continue;
            }
            stack.extend(self.nodes[current].children().iter().copied());
        }
        false
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Reset every node's traversal mark.
    pub fn reset_marks(&mut self) {
        for node in &mut self.nodes {
            node.set_mark(TraversalMark::Unvisited);
        }
    }

    /// Nodes in topological order: every parent precedes its children.
    ///
    /// Computed as reverse DFS finishing order, starting roots in index
    /// order. Does not touch the node marks.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut marks = vec![TraversalMark::Unvisited; self.nodes.len()];
        let mut finished = Vec::with_capacity(self.nodes.len());
        for start in 0..self.nodes.len() {
            if marks[start] == TraversalMark::Unvisited {
                self.visit_depth_first(start, &mut marks, &mut Vec::new(), &mut finished);
            }
        }
        finished.reverse();
        finished
    }

    // Iterative DFS from `start` over children. Appends discovery order to
    // `discovered` and finishing order to `finished`.
    fn visit_depth_first(
        &self,
        start: usize,
        marks: &mut [TraversalMark],
        discovered: &mut Vec<usize>,
        finished: &mut Vec<usize>,
    ) {
        if marks[start] != TraversalMark::Unvisited {
            return;
        }
        marks[start] = TraversalMark::InProgress;
        discovered.push(start);
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some((node, next)) = stack.pop() {
            let children = self.nodes[node].children();
            if let Some(&child) = children.get(next) {
                stack.push((node, next + 1));
                if marks[child] == TraversalMark::Unvisited {
                    marks[child] = TraversalMark::InProgress;
                    discovered.push(child);
                    stack.push((child, 0));
                }
            } else {
                marks[node] = TraversalMark::Done;
                finished.push(node);
            }
        }
    }

    /// Depth-first search from `start` along out-edges, returning nodes in
    /// discovery order.
    ///
    /// Uses the node marks, so nodes visited by an earlier search are
    /// skipped unless `reset_marks` is set.
    pub fn depth_first_search(&mut self, start: usize, reset_marks: bool) -> Result<Vec<usize>> {
        self.check(start)?;
        if reset_marks {
            self.reset_marks();
        }
        let mut marks: Vec<TraversalMark> = self.nodes.iter().map(BayesNode::mark).collect();
        let mut discovered = Vec::new();
        self.visit_depth_first(start, &mut marks, &mut discovered, &mut Vec::new());
        for (node, mark) in self.nodes.iter_mut().zip(marks) {
            node.set_mark(mark);
        }
        Ok(discovered)
    }

    /// Breadth-first search from `start` along out-edges. Resets the marks
    /// first and leaves every reached node marked `Done`.
    pub fn breadth_first_search(&mut self, start: usize) -> Result<Vec<usize>> {
        self.check(start)?;
        self.reset_marks();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        self.nodes[start].set_mark(TraversalMark::InProgress);
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for i in 0..self.nodes[current].children().len() {
                let child = self.nodes[current].children()[i];
                if self.nodes[child].mark() == TraversalMark::Unvisited {
                    self.nodes[child].set_mark(TraversalMark::InProgress);
                    queue.push_back(child);
                }
            }
            self.nodes[current].set_mark(TraversalMark::Done);
        }
        Ok(order)
    }

    /// Parents, children and the children's other parents of `index`,
    /// sorted and without `index` itself.
    pub fn markov_blanket(&self, index: usize) -> Result<Vec<usize>> {
        let node = self.node(index)?;
        let mut blanket: Vec<usize> = node.parents().to_vec();
        for &child in node.children() {
            blanket.push(child);
            blanket.extend(self.nodes[child].parents().iter().copied());
        }
        blanket.sort_unstable();
        blanket.dedup();
        blanket.retain(|&n| n != index);
        Ok(blanket)
    }

    /// True if the undirected skeleton has no cycles (the network is a
    /// polytree or a forest of polytrees).
    pub fn is_singly_connected(&self) -> bool {
        let mut component: Vec<usize> = (0..self.nodes.len()).collect();
        fn find(component: &mut [usize], mut x: usize) -> usize {
            while component[x] != x {
                component[x] = component[component[x]];
                x = component[x];
            }
            x
        }
        for (parent, node) in self.nodes.iter().enumerate() {
            for &child in node.children() {
                let a = find(&mut component, parent);
                let b = find(&mut component, child);
                if a == b {
                    return false;
                }
                component[a] = b;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Evidence
    // ------------------------------------------------------------------

    pub fn set_evidence(&mut self, index: usize, state: usize) -> Result<()> {
        self.node_mut(index)?.set_evidence(state)
    }

    pub fn clear_evidence(&mut self, index: usize) -> Result<()> {
        self.node_mut(index)?.clear_evidence();
        Ok(())
    }

    pub fn clear_all_evidence(&mut self) {
        for node in &mut self.nodes {
            node.clear_evidence();
        }
    }

    pub fn evidence(&self, index: usize) -> Result<Option<usize>> {
        Ok(self.node(index)?.evidence())
    }

    /// Indices of the nodes that carry evidence.
    pub fn evidence_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_evidence())
            .map(BayesNode::index)
            .collect()
    }

    /// Indices of the nodes without evidence.
    pub fn non_evidence_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_evidence())
            .map(BayesNode::index)
            .collect()
    }

    /// True if `assignment` agrees with every pinned node.
    pub fn consistent_with_evidence(&self, assignment: &[usize]) -> bool {
        self.nodes
            .iter()
            .zip(assignment)
            .all(|(node, &state)| node.evidence().is_none_or(|e| e == state))
    }

    // ------------------------------------------------------------------
    // Probabilities
    // ------------------------------------------------------------------

    /// Set one CPT row of `node`. Keys follow [`in_edges`](Self::in_edges).
    pub fn set_probabilities(
        &mut self,
        node: usize,
        parent_states: &[usize],
        probabilities: &[f64],
    ) -> Result<()> {
        self.node_mut(node)?
            .cpt_mut()
            .set_probabilities(parent_states, probabilities)
    }

    pub(crate) fn check_assignment(&self, assignment: &[usize]) -> Result<()> {
        if assignment.len() != self.nodes.len() {
            return Err(Error::ShapeMismatch {
                expected: self.nodes.len(),
                actual: assignment.len(),
            });
        }
        for (node, &state) in self.nodes.iter().zip(assignment) {
            if state >= node.state_count() {
                return Err(Error::StateOutOfRange {
                    node: node.index(),
                    state,
                    state_count: node.state_count(),
                });
            }
        }
        Ok(())
    }

    /// The CPT key of `index` under a full assignment.
    pub fn parent_states(&self, index: usize, assignment: &[usize]) -> Result<Vec<usize>> {
        let node = self.node(index)?;
        node.parents()
            .iter()
            .map(|&p| {
                assignment.get(p).copied().ok_or(Error::ShapeMismatch {
                    expected: self.nodes.len(),
                    actual: assignment.len(),
                })
            })
            .collect()
    }

    /// `P(x_index | parents(x_index))` read from a full assignment.
    pub fn node_probability(&self, index: usize, assignment: &[usize]) -> Result<f64> {
        self.check_assignment(assignment)?;
        self.node_probability_unchecked(index, assignment)
    }

    pub(crate) fn node_probability_unchecked(&self, index: usize, assignment: &[usize]) -> Result<f64> {
        let key = self.parent_states(index, assignment)?;
        self.nodes[index].cpt().probability(assignment[index], &key)
    }

    /// Chain-rule probability of a full assignment.
    pub fn joint_probability(&self, assignment: &[usize]) -> Result<f64> {
        self.check_assignment(assignment)?;
        (0..self.nodes.len()).try_fold(1.0, |acc, i| {
            Ok(acc * self.node_probability_unchecked(i, assignment)?)
        })
    }

    /// The full joint distribution by chain-rule enumeration.
    ///
    /// Evidence is ignored. Size is the product of all cardinalities, so
    /// this is only practical for small networks.
    pub fn joint_table(&self) -> Result<JointProbabilityTable> {
        let state_counts = self.state_counts();
        let mut table = JointProbabilityTable::new(&state_counts)?;
        for assignment in StateOdometer::new(&state_counts) {
            let p = self.joint_probability(&assignment)?;
            table.set_probability(&assignment, p)?;
        }
        Ok(table)
    }

    /// Normalize every CPT. Stops at the first degenerate table.
    pub fn normalize_probabilities(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.cpt_mut().normalize()?;
        }
        Ok(())
    }

    /// Replace every CPT row with a random distribution.
    pub fn randomize_probabilities<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for node in &mut self.nodes {
            node.cpt_mut().randomize(rng);
        }
    }

    // ------------------------------------------------------------------
    // Labels
    // ------------------------------------------------------------------

    pub fn set_label(&mut self, index: usize, label: impl Into<String>) -> Result<()> {
        self.node_mut(index)?.set_label(label);
        Ok(())
    }

    pub fn label(&self, index: usize) -> Result<Option<&str>> {
        Ok(self.node(index)?.label())
    }

    /// Index of the first node carrying `label`.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.label() == Some(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Cloudy -> {Sprinkler, Rain} -> WetGrass.
    fn diamond() -> BayesNet {
        let mut net = BayesNet::new(&[2, 2, 2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        net.add_edge(0, 2).unwrap();
        net.add_edge(1, 3).unwrap();
        net.add_edge(2, 3).unwrap();
        net
    }

    #[test]
    fn test_new_rejects_bad_cardinality() {
        assert!(matches!(
            BayesNet::new(&[2, 1]),
            Err(Error::InvalidStateCount { node: 1, .. })
        ));
    }

    #[test]
    fn test_add_edge_self_loop_and_duplicate() {
        let mut net = BayesNet::new(&[2, 2]).unwrap();
        let before = net.clone();
        assert!(!net.add_edge(1, 1).unwrap());
        assert_eq!(net, before);
        assert!(net.add_edge(0, 1).unwrap());
        let after_first = net.clone();
        assert!(!net.add_edge(0, 1).unwrap());
        assert_eq!(net, after_first);
    }

    #[test]
    fn test_add_edge_rejects_cycle() {
        let mut net = BayesNet::new(&[2, 2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        net.add_edge(1, 2).unwrap();
        assert!(matches!(
            net.add_edge(2, 0),
            Err(Error::CycleDetected { parent: 2, child: 0 })
        ));
        assert!(net.out_edges(2).unwrap().is_empty());
    }

    #[test]
    fn test_add_edge_refuses_oversized_cpt() {
        let mut net = BayesNet::new(&[4096, 4096, 2]).unwrap();
        assert!(net.add_edge(0, 2).unwrap());
        assert!(matches!(
            net.add_edge(1, 2),
            Err(Error::TableTooLarge { .. })
        ));
        assert!(!net.has_edge(1, 2));
        assert!(net.out_edges(1).unwrap().is_empty());
        assert_eq!(net.in_edges(2).unwrap(), vec![0]);
        assert_eq!(net.node(2).unwrap().cpt().row_count(), 4096);
    }

    #[test]
    fn test_joint_table_too_large() {
        let net = BayesNet::new(&[2; 64]).unwrap();
        assert!(matches!(
            net.joint_table(),
            Err(Error::TableTooLarge { variables: 64, .. })
        ));
    }

    #[test]
    fn test_add_edge_out_of_range() {
        let mut net = BayesNet::new(&[2, 2]).unwrap();
        assert!(matches!(
            net.add_edge(0, 5),
            Err(Error::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn test_in_edges_follow_insertion_order() {
        let mut net = BayesNet::new(&[2, 3, 2]).unwrap();
        net.add_edge(1, 2).unwrap();
        net.add_edge(0, 2).unwrap();
        assert_eq!(net.in_edges(2).unwrap(), &[1, 0]);
        assert_eq!(net.node(2).unwrap().cpt().parent_state_counts(), &[3, 2]);
    }

    #[test]
    fn test_remove_edge() {
        let mut net = diamond();
        assert!(net.remove_edge(1, 3).unwrap());
        assert!(!net.remove_edge(1, 3).unwrap());
        assert_eq!(net.in_edges(3).unwrap(), &[2]);
        assert_eq!(net.node(3).unwrap().cpt().row_count(), 2);
    }

    #[test]
    fn test_root_and_leaf() {
        let mut net = BayesNet::new(&[2, 2, 2]).unwrap();
        net.add_edge(0, 1).unwrap();
        assert!(net.is_root(0).unwrap());
        assert!(!net.is_leaf(0).unwrap());
        assert!(net.is_leaf(1).unwrap());
        // Isolated node is neither.
        assert!(!net.is_root(2).unwrap());
        assert!(!net.is_leaf(2).unwrap());
    }

    #[test]
    fn test_topological_order_diamond() {
        let net = diamond();
        let order = net.topological_order();
        assert_eq!(order.len(), 4);
        let pos = |n: usize| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(3));
    }

    #[test]
    fn test_depth_first_search_uses_marks() {
        let mut net = diamond();
        assert_eq!(net.depth_first_search(0, true).unwrap(), vec![0, 1, 3, 2]);
        // Everything is marked now; a second search without reset finds nothing new.
        assert!(net.depth_first_search(1, false).unwrap().is_empty());
        assert_eq!(net.depth_first_search(1, true).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_breadth_first_search() {
        let mut net = diamond();
        assert_eq!(net.breadth_first_search(0).unwrap(), vec![0, 1, 2, 3]);
        assert!(net
            .nodes()
            .iter()
            .all(|n| n.mark() == TraversalMark::Done));
    }

    #[test]
    fn test_markov_blanket() {
        let net = diamond();
        assert_eq!(net.markov_blanket(1).unwrap(), vec![0, 2, 3]);
        assert_eq!(net.markov_blanket(0).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_singly_connected() {
        assert!(!diamond().is_singly_connected());
        let mut tree = BayesNet::new(&[2, 2, 2]).unwrap();
        tree.add_edge(0, 2).unwrap();
        tree.add_edge(1, 2).unwrap();
        assert!(tree.is_singly_connected());
    }

    #[test]
    fn test_evidence_lists() {
        let mut net = diamond();
        net.set_evidence(3, 1).unwrap();
        assert_eq!(net.evidence_nodes(), vec![3]);
        assert_eq!(net.non_evidence_nodes(), vec![0, 1, 2]);
        assert!(net.consistent_with_evidence(&[0, 0, 0, 1]));
        assert!(!net.consistent_with_evidence(&[0, 0, 0, 0]));
        assert!(net.set_evidence(3, 2).is_err());
        net.clear_all_evidence();
        assert!(net.evidence_nodes().is_empty());
    }

    #[test]
    fn test_joint_table_sums_to_one() {
        let mut net = diamond();
        let mut rng = StdRng::seed_from_u64(5);
        net.randomize_probabilities(&mut rng);
        let table = net.joint_table().unwrap();
        assert!((table.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_node_probability_checks_assignment() {
        let net = diamond();
        assert!(matches!(
            net.node_probability(0, &[0, 0]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            net.node_probability(0, &[0, 0, 0, 2]),
            Err(Error::StateOutOfRange { node: 3, .. })
        ));
        assert_eq!(net.node_probability(3, &[0, 0, 0, 1]).unwrap(), 0.5);
    }

    #[test]
    fn test_labels() {
        let mut net = diamond();
        net.set_label(2, "rain").unwrap();
        assert_eq!(net.index_of("rain"), Some(2));
        assert_eq!(net.label(2).unwrap(), Some("rain"));
        assert_eq!(net.index_of("snow"), None);
    }
}
