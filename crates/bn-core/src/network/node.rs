//! A single discrete random variable in a network.

use bn_common::{Error, Result};

use crate::table::ConditionalProbabilityTable;

/// Per-node scratch flag used by depth- and breadth-first traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMark {
    #[default]
    Unvisited,
    InProgress,
    Done,
}

/// A node: its cardinality, CPT, optional evidence and adjacency.
///
/// `parents` mirrors the in-edges in insertion order and is kept in step
/// with `children` by the owning [`BayesNet`](super::BayesNet). CPT keys use
/// the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct BayesNode {
    index: usize,
    state_count: usize,
    cpt: ConditionalProbabilityTable,
    evidence: Option<usize>,
    children: Vec<usize>,
    parents: Vec<usize>,
    mark: TraversalMark,
    label: Option<String>,
}

impl BayesNode {
    pub(crate) fn new(index: usize, state_count: usize) -> Result<Self> {
        if state_count < 2 {
            return Err(Error::InvalidStateCount {
                node: index,
                state_count,
            });
        }
        Ok(Self {
            index,
            state_count,
            cpt: ConditionalProbabilityTable::new(state_count, &[])?,
            evidence: None,
            children: Vec::new(),
            parents: Vec::new(),
            mark: TraversalMark::Unvisited,
            label: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn cpt(&self) -> &ConditionalProbabilityTable {
        &self.cpt
    }

    /// Mutable CPT access. The parent dimensions are owned by the network;
    /// use this for probabilities only.
    pub fn cpt_mut(&mut self) -> &mut ConditionalProbabilityTable {
        &mut self.cpt
    }

    pub fn evidence(&self) -> Option<usize> {
        self.evidence
    }

    pub fn is_evidence(&self) -> bool {
        self.evidence.is_some()
    }

    /// Pin the node to an observed state.
    pub fn set_evidence(&mut self, state: usize) -> Result<()> {
        if state >= self.state_count {
            return Err(Error::StateOutOfRange {
                node: self.index,
                state,
                state_count: self.state_count,
            });
        }
        self.evidence = Some(state);
        Ok(())
    }

    pub fn clear_evidence(&mut self) {
        self.evidence = None;
    }

    /// Out-edges in insertion order.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// In-edges in insertion order; also the CPT key order.
    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    pub fn mark(&self) -> TraversalMark {
        self.mark
    }

    pub(crate) fn set_mark(&mut self, mark: TraversalMark) {
        self.mark = mark;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub(crate) fn push_child(&mut self, child: usize) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: usize) -> bool {
        match self.children.iter().position(|&c| c == child) {
            Some(pos) => {
                self.children.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Leaves the node untouched if the grown CPT would be too large.
    pub(crate) fn push_parent(&mut self, parent: usize, parent_state_count: usize) -> Result<()> {
        self.cpt.add_variable(parent_state_count)?;
        self.parents.push(parent);
        Ok(())
    }

    pub(crate) fn remove_parent(&mut self, parent: usize) -> Result<()> {
        if let Some(pos) = self.parents.iter().position(|&p| p == parent) {
            self.cpt.remove_variable(pos)?;
            self.parents.remove(pos);
        }
        Ok(())
    }
}
