//! Joint probability tables over every node of a network.
//!
//! The table is materialized eagerly over the full Cartesian product of the
//! variables' cardinalities and starts at zero. Samplers accumulate counts or
//! weights into it and normalize at the end.

use bn_common::{Error, Result};
use bn_math::{compensated_sum, normalize_by};
use rand::Rng;

use super::marginal::MarginalProbabilityTable;
use super::odometer::{self, StateOdometer};

/// Dense joint distribution over a fixed list of discrete variables.
#[derive(Debug, Clone, PartialEq)]
pub struct JointProbabilityTable {
    state_counts: Vec<usize>,
    probabilities: Vec<f64>,
}

impl JointProbabilityTable {
    /// Create an all-zero table over variables with the given cardinalities.
    ///
    /// Fails with `TableTooLarge` past
    /// [`MAX_TABLE_CELLS`](odometer::MAX_TABLE_CELLS) assignments.
    pub fn new(state_counts: &[usize]) -> Result<Self> {
        let size = odometer::table_cells(state_counts, 1)?;
        Ok(Self {
            state_counts: state_counts.to_vec(),
            probabilities: vec![0.0; size],
        })
    }

    pub fn state_counts(&self) -> &[usize] {
        &self.state_counts
    }

    /// Number of variables.
    pub fn variable_count(&self) -> usize {
        self.state_counts.len()
    }

    /// Number of joint assignments (rows).
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    fn index(&self, assignment: &[usize]) -> Result<usize> {
        odometer::encode(&self.state_counts, assignment).ok_or_else(|| Error::KeyNotFound {
            key: assignment.to_vec(),
        })
    }

    /// Probability of a full assignment.
    pub fn probability(&self, assignment: &[usize]) -> Result<f64> {
        Ok(self.probabilities[self.index(assignment)?])
    }

    /// Overwrite the entry for an existing assignment.
    pub fn set_probability(&mut self, assignment: &[usize], value: f64) -> Result<()> {
        let index = self.index(assignment)?;
        self.probabilities[index] = value;
        Ok(())
    }

    /// Add `amount` to the entry for an existing assignment.
    pub fn add_to_probability(&mut self, assignment: &[usize], amount: f64) -> Result<()> {
        let index = self.index(assignment)?;
        self.probabilities[index] += amount;
        Ok(())
    }

    /// `P(variable = state)`, summing every row that agrees.
    pub fn marginal(&self, variable: usize, state: usize) -> Result<f64> {
        let radix = *self.state_counts.get(variable).ok_or(Error::IndexOutOfRange {
            index: variable,
            len: self.state_counts.len(),
        })?;
        if state >= radix {
            return Err(Error::TableStateOutOfRange {
                state,
                state_count: radix,
            });
        }
        let stride = odometer::stride(&self.state_counts, variable);
        let matching: Vec<f64> = self
            .probabilities
            .iter()
            .enumerate()
            .filter(|(i, _)| (i / stride) % radix == state)
            .map(|(_, p)| *p)
            .collect();
        Ok(compensated_sum(&matching))
    }

    /// Every single-variable marginal, computed in one pass.
    pub fn marginal_table(&self) -> MarginalProbabilityTable {
        let mut marginals = MarginalProbabilityTable::new(&self.state_counts);
        let strides: Vec<usize> = (0..self.state_counts.len())
            .map(|v| odometer::stride(&self.state_counts, v))
            .collect();
        for (i, &p) in self.probabilities.iter().enumerate() {
            if p == 0.0 {
                continue;
            }
            for (variable, (&stride, &radix)) in strides.iter().zip(&self.state_counts).enumerate() {
                marginals.accumulate(variable, (i / stride) % radix, p);
            }
        }
        marginals
    }

    /// Sum of all entries.
    pub fn total(&self) -> f64 {
        compensated_sum(&self.probabilities)
    }

    /// Divide by the total so the table sums to 1.
    ///
    /// Returns the normalizer. A table with zero or non-finite total is left
    /// unchanged and reported as `DegenerateNormalization`.
    pub fn normalize(&mut self) -> Result<f64> {
        self.normalize_by(0.0)
    }

    /// Divide every entry by `alpha`; a non-positive `alpha` means "use the
    /// current total".
    pub fn normalize_by(&mut self, alpha: f64) -> Result<f64> {
        let alpha = if alpha <= 0.0 { self.total() } else { alpha };
        normalize_by(&mut self.probabilities, alpha).ok_or_else(|| {
            Error::DegenerateNormalization(format!(
                "joint table normalizer is {alpha}; it must be positive and finite"
            ))
        })
    }

    /// Set every entry to `value`.
    pub fn reset(&mut self, value: f64) {
        self.probabilities.iter_mut().for_each(|p| *p = value);
    }

    /// Fill with random values and normalize.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.probabilities
            .iter_mut()
            .for_each(|p| *p = rng.random::<f64>());
        if self.normalize().is_err() {
            let uniform = 1.0 / self.len().max(1) as f64;
            self.reset(uniform);
        }
    }

    /// Append a variable and rebuild the table at zero. On `TableTooLarge`
    /// the table is left as it was.
    pub fn add_variable(&mut self, state_count: usize) -> Result<()> {
        let mut state_counts = self.state_counts.clone();
        state_counts.push(state_count);
        *self = Self::new(&state_counts)?;
        Ok(())
    }

    /// Assignment and value at flat index `index`.
    pub fn row(&self, index: usize) -> Option<(Vec<usize>, f64)> {
        let p = *self.probabilities.get(index)?;
        Some((odometer::decode(&self.state_counts, index), p))
    }

    /// Iterate `(assignment, probability)` in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<usize>, f64)> + '_ {
        StateOdometer::new(&self.state_counts).zip(self.probabilities.iter().copied())
    }

    /// Raw values in table order.
    pub fn as_slice(&self) -> &[f64] {
        &self.probabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_three() -> JointProbabilityTable {
        let mut jpt = JointProbabilityTable::new(&[2, 3]).unwrap();
        for (i, (assignment, _)) in JointProbabilityTable::new(&[2, 3]).unwrap().iter().enumerate() {
            jpt.set_probability(&assignment, (i + 1) as f64).unwrap();
        }
        jpt
    }

    #[test]
    fn test_new_is_zero_and_sized() {
        let jpt = JointProbabilityTable::new(&[2, 3, 2]).unwrap();
        assert_eq!(jpt.len(), 12);
        assert_eq!(jpt.variable_count(), 3);
        assert!(jpt.as_slice().iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_unknown_key() {
        let mut jpt = JointProbabilityTable::new(&[2, 2]).unwrap();
        assert!(matches!(
            jpt.probability(&[0, 2]),
            Err(Error::KeyNotFound { .. })
        ));
        assert!(jpt.add_to_probability(&[0], 1.0).is_err());
    }

    #[test]
    fn test_marginal_scan() {
        let mut jpt = two_by_three();
        jpt.normalize().unwrap();
        // Entries 1..=6 over total 21; variable 0 = 1 covers 4+5+6.
        assert!((jpt.marginal(0, 1).unwrap() - 15.0 / 21.0).abs() < 1e-12);
        assert!((jpt.marginal(1, 2).unwrap() - 9.0 / 21.0).abs() < 1e-12);
        assert!(jpt.marginal(2, 0).is_err());
        assert!(jpt.marginal(1, 3).is_err());
    }

    #[test]
    fn test_marginal_table_matches_scan() {
        let mut jpt = two_by_three();
        jpt.normalize().unwrap();
        let marginals = jpt.marginal_table();
        for variable in 0..2 {
            for state in 0..jpt.state_counts()[variable] {
                let scanned = jpt.marginal(variable, state).unwrap();
                let tabled = marginals.probability(variable, state).unwrap();
                assert!((scanned - tabled).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_normalize_with_alpha() {
        let mut jpt = two_by_three();
        assert_eq!(jpt.normalize_by(2.0).unwrap(), 2.0);
        assert_eq!(jpt.probability(&[0, 0]).unwrap(), 0.5);
        assert_eq!(jpt.normalize_by(-1.0).unwrap(), 10.5);
    }

    #[test]
    fn test_normalize_zero_table_is_error_and_unchanged() {
        let mut jpt = JointProbabilityTable::new(&[2, 2]).unwrap();
        assert!(matches!(
            jpt.normalize(),
            Err(Error::DegenerateNormalization(_))
        ));
        assert!(jpt.as_slice().iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_add_variable_rebuilds() {
        let mut jpt = two_by_three();
        jpt.add_variable(2).unwrap();
        assert_eq!(jpt.len(), 12);
        assert_eq!(jpt.total(), 0.0);
    }

    #[test]
    fn test_oversized_table_is_refused() {
        assert!(matches!(
            JointProbabilityTable::new(&[2; 64]),
            Err(Error::TableTooLarge { variables: 64, .. })
        ));
        let mut jpt = two_by_three();
        let before = jpt.clone();
        assert!(jpt.add_variable(odometer::MAX_TABLE_CELLS).is_err());
        assert_eq!(jpt, before);
    }

    #[test]
    fn test_row_and_reset() {
        let mut jpt = two_by_three();
        assert_eq!(jpt.row(4), Some((vec![1, 1], 5.0)));
        assert_eq!(jpt.row(6), None);
        jpt.reset(0.25);
        assert_eq!(jpt.total(), 1.5);
    }
}
