//! Per-variable marginal distributions.

use bn_common::{Error, Result};
use bn_math::{argmax_first, is_valid_weights, normalize_in_place};

/// One probability vector per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalProbabilityTable {
    probabilities: Vec<Vec<f64>>,
}

impl MarginalProbabilityTable {
    /// All-zero table for variables with the given cardinalities.
    pub fn new(state_counts: &[usize]) -> Self {
        Self {
            probabilities: state_counts.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    /// Build directly from per-variable vectors.
    pub fn from_rows(probabilities: Vec<Vec<f64>>) -> Self {
        Self { probabilities }
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    fn cell(&self, variable: usize, state: usize) -> Result<(usize, usize)> {
        let row = self.variable(variable)?;
        if state >= row.len() {
            return Err(Error::TableStateOutOfRange {
                state,
                state_count: row.len(),
            });
        }
        Ok((variable, state))
    }

    /// The distribution of one variable.
    pub fn variable(&self, variable: usize) -> Result<&[f64]> {
        self.probabilities
            .get(variable)
            .map(Vec::as_slice)
            .ok_or(Error::IndexOutOfRange {
                index: variable,
                len: self.probabilities.len(),
            })
    }

    pub fn probability(&self, variable: usize, state: usize) -> Result<f64> {
        let (v, s) = self.cell(variable, state)?;
        Ok(self.probabilities[v][s])
    }

    pub fn set_probability(&mut self, variable: usize, state: usize, value: f64) -> Result<()> {
        let (v, s) = self.cell(variable, state)?;
        self.probabilities[v][s] = value;
        Ok(())
    }

    pub fn add_to_probability(&mut self, variable: usize, state: usize, amount: f64) -> Result<()> {
        let (v, s) = self.cell(variable, state)?;
        self.probabilities[v][s] += amount;
        Ok(())
    }

    // Unchecked accumulation for callers that already validated the cell.
    pub(crate) fn accumulate(&mut self, variable: usize, state: usize, amount: f64) {
        self.probabilities[variable][state] += amount;
    }

    /// State with the highest probability. Ties go to the lowest index, and
    /// an all-zero row yields 0.
    pub fn most_probable_state(&self, variable: usize) -> Result<usize> {
        Ok(argmax_first(self.variable(variable)?))
    }

    /// Normalize each variable independently.
    ///
    /// Fails without mutating if any variable has zero or non-finite mass.
    pub fn normalize(&mut self) -> Result<()> {
        if let Some(variable) = self.probabilities.iter().position(|row| !is_valid_weights(row)) {
            return Err(Error::DegenerateNormalization(format!(
                "marginal for variable {variable} has no probability mass"
            )));
        }
        for row in &mut self.probabilities {
            normalize_in_place(row);
        }
        Ok(())
    }

    /// Set every entry to `value`.
    pub fn reset(&mut self, value: f64) {
        for row in &mut self.probabilities {
            row.iter_mut().for_each(|p| *p = value);
        }
    }

    /// Iterate per-variable distributions in index order.
    pub fn iter(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.probabilities.iter().map(Vec::as_slice)
    }
}
