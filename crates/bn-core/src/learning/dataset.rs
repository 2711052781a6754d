//! Complete-data training sets.
//!
//! One row per line, one state index per node, separated by commas and/or
//! whitespace. Blank lines and `#` comments are skipped.
//!
//! ```text
//! # cloudy sprinkler rain wet
//! 1, 0, 1, 1
//! 0 1 0 1
//! ```

use std::path::Path;

use bn_common::{Error, Result};

use crate::network::BayesNet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    rows: Vec<Vec<usize>>,
}

impl Dataset {
    pub fn from_rows(rows: Vec<Vec<usize>>) -> Self {
        Self { rows }
    }

    /// Parse the text format. Errors report the 1-based line number.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows: Vec<Vec<usize>> = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let row = line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|field| !field.is_empty())
                .map(|field| {
                    field.parse::<usize>().map_err(|_| Error::Dataset {
                        line: i + 1,
                        message: format!("'{}' is not a state index", field),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            if let Some(first) = rows.first().map(Vec::len) {
                if row.len() != first {
                    return Err(Error::Dataset {
                        line: i + 1,
                        message: format!("expected {} values, found {}", first, row.len()),
                    });
                }
            }
            rows.push(row);
        }
        Ok(Self { rows })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check every row has one in-range state per node of `net`.
    ///
    /// Line numbers in errors count data rows, not source lines.
    pub fn validate_against(&self, net: &BayesNet) -> Result<()> {
        let counts = net.state_counts();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != counts.len() {
                return Err(Error::Dataset {
                    line: i + 1,
                    message: format!("row has {} values; network has {} nodes", row.len(), counts.len()),
                });
            }
            for (node, (&state, &count)) in row.iter().zip(&counts).enumerate() {
                if state >= count {
                    return Err(Error::Dataset {
                        line: i + 1,
                        message: format!("state {} of node {} exceeds its {} states", state, node, count),
                    });
                }
            }
        }
        Ok(())
    }
}
