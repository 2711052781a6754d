//! Conditional probability tables.
//!
//! A CPT holds `P(X = x | parents = k)` for every state `x` of its node and
//! every parent-state key `k`. Keys cover the full Cartesian product of the
//! parents' cardinalities and are ordered exactly like the node's parent list
//! (edge insertion order). Rows are stored flat in mixed-radix order.
//!
//! Growing or shrinking the parent set rebuilds the table at uniform values,
//! discarding prior assignments. Set probabilities only after the final edge
//! set is in place.

use bn_common::{Error, Result};
use bn_math::{is_valid_weights, normalize_in_place};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use super::odometer::{self, StateOdometer};

/// Borrowed view of one CPT row.
#[derive(Debug, Clone, PartialEq)]
pub struct CptRow<'a> {
    /// Flat row index.
    pub index: usize,
    /// Parent-state key of this row.
    pub parent_states: Vec<usize>,
    /// `P(X = x | parent_states)` for each state `x`.
    pub probabilities: &'a [f64],
}

/// Conditional probability table for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalProbabilityTable {
    state_count: usize,
    parent_state_counts: Vec<usize>,
    probabilities: Vec<f64>,
}

impl ConditionalProbabilityTable {
    /// Create a table with one uniform row per parent-state key.
    ///
    /// With no parents there is a single row keyed by `[]`. Fails with
    /// `TableTooLarge` when the rows would exceed
    /// [`MAX_TABLE_CELLS`](odometer::MAX_TABLE_CELLS).
    pub fn new(state_count: usize, parent_state_counts: &[usize]) -> Result<Self> {
        Ok(Self {
            state_count,
            parent_state_counts: parent_state_counts.to_vec(),
            probabilities: uniform_cells(state_count, parent_state_counts)?,
        })
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Cardinality of each parent, in key order.
    pub fn parent_state_counts(&self) -> &[usize] {
        &self.parent_state_counts
    }

    /// Number of parent-state keys.
    pub fn row_count(&self) -> usize {
        if self.state_count == 0 {
            0
        } else {
            self.probabilities.len() / self.state_count
        }
    }

    /// Number of probability entries per row.
    pub fn column_count(&self) -> usize {
        self.state_count
    }

    /// Flat row index for a parent-state key.
    pub fn row_index(&self, parent_states: &[usize]) -> Result<usize> {
        odometer::encode(&self.parent_state_counts, parent_states).ok_or_else(|| {
            Error::KeyNotFound {
                key: parent_states.to_vec(),
            }
        })
    }

    fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        row * self.state_count..(row + 1) * self.state_count
    }

    /// The full distribution `P(X | parent_states)`.
    pub fn probabilities(&self, parent_states: &[usize]) -> Result<&[f64]> {
        let row = self.row_index(parent_states)?;
        Ok(&self.probabilities[self.row_range(row)])
    }

    /// `P(X = state | parent_states)`.
    pub fn probability(&self, state: usize, parent_states: &[usize]) -> Result<f64> {
        let row = self.probabilities(parent_states)?;
        row.get(state).copied().ok_or(Error::TableStateOutOfRange {
            state,
            state_count: self.state_count,
        })
    }

    /// Replace the row for an existing key.
    ///
    /// Never inserts: an unknown key is `KeyNotFound`, and a vector whose
    /// length differs from the state count is `ShapeMismatch`.
    pub fn set_probabilities(&mut self, parent_states: &[usize], probabilities: &[f64]) -> Result<()> {
        let row = self.row_index(parent_states)?;
        if probabilities.len() != self.state_count {
            return Err(Error::ShapeMismatch {
                expected: self.state_count,
                actual: probabilities.len(),
            });
        }
        let range = self.row_range(row);
        self.probabilities[range].copy_from_slice(probabilities);
        Ok(())
    }

    /// Add `amount` to a single cell. Used for count-based learning.
    pub fn add_to_probability(&mut self, state: usize, parent_states: &[usize], amount: f64) -> Result<()> {
        let row = self.row_index(parent_states)?;
        if state >= self.state_count {
            return Err(Error::TableStateOutOfRange {
                state,
                state_count: self.state_count,
            });
        }
        self.probabilities[row * self.state_count + state] += amount;
        Ok(())
    }

    /// Set every cell to `value`.
    pub fn reset_probabilities(&mut self, value: f64) {
        self.probabilities.iter_mut().for_each(|p| *p = value);
    }

    /// Append a parent dimension of the given cardinality and rebuild the
    /// table at uniform values. Existing assignments are discarded.
    ///
    /// On `TableTooLarge` the table is left as it was.
    pub fn add_variable(&mut self, parent_state_count: usize) -> Result<()> {
        let mut parent_state_counts = self.parent_state_counts.clone();
        parent_state_counts.push(parent_state_count);
        self.probabilities = uniform_cells(self.state_count, &parent_state_counts)?;
        self.parent_state_counts = parent_state_counts;
        Ok(())
    }

    /// Drop the parent dimension at `position` and rebuild at uniform values.
    pub fn remove_variable(&mut self, position: usize) -> Result<()> {
        if position >= self.parent_state_counts.len() {
            return Err(Error::IndexOutOfRange {
                index: position,
                len: self.parent_state_counts.len(),
            });
        }
        let mut parent_state_counts = self.parent_state_counts.clone();
        parent_state_counts.remove(position);
        self.probabilities = uniform_cells(self.state_count, &parent_state_counts)?;
        self.parent_state_counts = parent_state_counts;
        Ok(())
    }

    /// Make every row sum to 1.
    ///
    /// If any row has zero or non-finite mass the table is left unchanged
    /// and `DegenerateNormalization` names the first offending key.
    pub fn normalize(&mut self) -> Result<()> {
        for row in 0..self.row_count() {
            if !is_valid_weights(&self.probabilities[self.row_range(row)]) {
                return Err(Error::DegenerateNormalization(format!(
                    "CPT row {:?} has no probability mass",
                    odometer::decode(&self.parent_state_counts, row)
                )));
            }
        }
        for row in 0..self.row_count() {
            let range = self.row_range(row);
            normalize_in_place(&mut self.probabilities[range]);
        }
        Ok(())
    }

    /// Fill every row with a random distribution.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let uniform = 1.0 / self.state_count.max(1) as f64;
        for row in 0..self.row_count() {
            let range = self.row_range(row);
            let cells = &mut self.probabilities[range];
            cells.iter_mut().for_each(|p| *p = rng.random::<f64>());
            if normalize_in_place(cells).is_none() {
                cells.iter_mut().for_each(|p| *p = uniform);
            }
        }
    }

    /// Draw a state from `P(X | parent_states)`.
    ///
    /// The row is treated as a vector of weights, so it need not be
    /// normalized. Rows with negative, non-finite or all-zero entries are
    /// rejected with `InvalidDistribution`.
    pub fn sample<R: Rng + ?Sized>(&self, parent_states: &[usize], rng: &mut R) -> Result<usize> {
        let row = self.probabilities(parent_states)?;
        let dist = WeightedIndex::<f64>::new(row).map_err(|e| {
            Error::InvalidDistribution(format!("CPT row {:?}: {}", parent_states, e))
        })?;
        Ok(dist.sample(rng))
    }

    /// Indices of the rows whose key has `value` at `parent_position`.
    pub fn find_parent_state(&self, parent_position: usize, value: usize) -> Vec<usize> {
        match self.parent_state_counts.get(parent_position) {
            Some(&radix) if value < radix => {
                let stride = odometer::stride(&self.parent_state_counts, parent_position);
                (0..self.row_count())
                    .filter(|row| (row / stride) % radix == value)
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Row at flat index `index`.
    pub fn row(&self, index: usize) -> Option<CptRow<'_>> {
        if index >= self.row_count() {
            return None;
        }
        Some(CptRow {
            index,
            parent_states: odometer::decode(&self.parent_state_counts, index),
            probabilities: &self.probabilities[self.row_range(index)],
        })
    }

    /// Iterate rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = CptRow<'_>> + '_ {
        StateOdometer::new(&self.parent_state_counts)
            .zip(self.probabilities.chunks(self.state_count.max(1)))
            .enumerate()
            .map(|(index, (parent_states, probabilities))| CptRow {
                index,
                parent_states,
                probabilities,
            })
    }
}

// Uniform rows for every key over `parent_state_counts`.
fn uniform_cells(state_count: usize, parent_state_counts: &[usize]) -> Result<Vec<f64>> {
    let cells = odometer::table_cells(parent_state_counts, state_count)?;
    let uniform = if state_count == 0 {
        0.0
    } else {
        1.0 / state_count as f64
    };
    Ok(vec![uniform; cells])
}
