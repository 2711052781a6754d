//! On-disk network description.
//!
//! Networks are stored as JSON or TOML with the same shape:
//!
//! ```toml
//! edges = [["cloudy", "rain"]]
//!
//! [[nodes]]
//! name = "cloudy"
//! states = 2
//!
//! [[nodes]]
//! name = "rain"
//! states = 2
//! state_names = ["dry", "wet"]
//!
//! [[cpts]]
//! node = "rain"
//! parents = [1]
//! probabilities = [0.2, 0.8]
//! ```
//!
//! `parents` lists one state index per parent, in the order the file's
//! edges introduce that node's parents. [`NetworkFile::build`] adds every
//! edge before writing any CPT row, so rows are never discarded by a later
//! edge.

use std::collections::HashMap;
use std::path::Path;

use bn_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::BayesNet;

/// Serialization format of a network or config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// Pick the format from the file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FileFormat::Toml,
            _ => FileFormat::Json,
        }
    }
}

/// One variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    /// Cardinality (at least 2).
    pub states: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<usize>,
}

/// One CPT row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CptSpec {
    pub node: String,
    #[serde(default)]
    pub parents: Vec<usize>,
    pub probabilities: Vec<f64>,
}

/// A complete network description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<[String; 2]>,
    #[serde(default)]
    pub cpts: Vec<CptSpec>,
}

/// SHA-256 of a file's text, hex encoded.
pub fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

impl NetworkFile {
    pub fn parse(text: &str, format: FileFormat) -> Result<Self> {
        Ok(match format {
            FileFormat::Json => serde_json::from_str(text)?,
            FileFormat::Toml => toml::from_str(text)?,
        })
    }

    /// Read and parse a file, returning it with the digest of its text.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let text = std::fs::read_to_string(path)?;
        let file = Self::parse(&text, FileFormat::from_path(path))?;
        Ok((file, digest(&text)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn index_map(&self) -> Result<HashMap<&str, usize>> {
        let mut map = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if map.insert(node.name.as_str(), i).is_some() {
                return Err(Error::Config(format!("duplicate node name '{}'", node.name)));
            }
        }
        Ok(map)
    }

    /// Index of the node called `name`.
    pub fn node_index(&self, name: &str) -> Result<usize> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| Error::Config(format!("unknown node '{name}'")))
    }

    /// Resolve a state given either by index or by one of the node's state
    /// names.
    pub fn state_index(&self, node: usize, state: &str) -> Result<usize> {
        let spec = self.nodes.get(node).ok_or(Error::IndexOutOfRange {
            index: node,
            len: self.nodes.len(),
        })?;
        if let Some(i) = spec.state_names.iter().position(|s| s == state) {
            return Ok(i);
        }
        let i: usize = state.parse().map_err(|_| {
            Error::Config(format!("node '{}' has no state '{state}'", spec.name))
        })?;
        if i >= spec.states {
            return Err(Error::StateOutOfRange {
                node,
                state: i,
                state_count: spec.states,
            });
        }
        Ok(i)
    }

    /// Display name for `state` of `node`, falling back to the index.
    pub fn state_name(&self, node: usize, state: usize) -> String {
        self.nodes
            .get(node)
            .and_then(|n| n.state_names.get(state))
            .cloned()
            .unwrap_or_else(|| state.to_string())
    }

    /// Construct the network: nodes, then all edges, then CPT rows, then
    /// evidence.
    pub fn build(&self) -> Result<BayesNet> {
        let index = self.index_map()?;
        for node in &self.nodes {
            if !node.state_names.is_empty() && node.state_names.len() != node.states {
                return Err(Error::Config(format!(
                    "node '{}' declares {} states but names {}",
                    node.name,
                    node.states,
                    node.state_names.len()
                )));
            }
        }
        let lookup = |name: &str| -> Result<usize> {
            index
                .get(name)
                .copied()
                .ok_or_else(|| Error::Config(format!("unknown node '{name}'")))
        };

        let state_counts: Vec<usize> = self.nodes.iter().map(|n| n.states).collect();
        let mut net = BayesNet::new(&state_counts)?;
        for (i, node) in self.nodes.iter().enumerate() {
            net.set_label(i, node.name.clone())?;
        }
        for [parent, child] in &self.edges {
            let (p, c) = (lookup(parent)?, lookup(child)?);
            if !net.add_edge(p, c)? {
                return Err(Error::Config(format!(
                    "edge {parent} -> {child} is a self-loop or duplicate"
                )));
            }
        }
        for row in &self.cpts {
            let node = lookup(&row.node)?;
            net.set_probabilities(node, &row.parents, &row.probabilities)?;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(state) = node.evidence {
                net.set_evidence(i, state)?;
            }
        }
        Ok(net)
    }

    /// Replace the CPT rows with the current tables of `net`, which must
    /// have been built from this file.
    pub fn update_probabilities(&mut self, net: &BayesNet) -> Result<()> {
        if net.len() != self.nodes.len() {
            return Err(Error::ShapeMismatch {
                expected: self.nodes.len(),
                actual: net.len(),
            });
        }
        self.cpts = net
            .nodes()
            .iter()
            .zip(&self.nodes)
            .flat_map(|(node, spec)| {
                node.cpt().rows().map(move |row| CptSpec {
                    node: spec.name.clone(),
                    parents: row.parent_states,
                    probabilities: row.probabilities.to_vec(),
                })
            })
            .collect();
        Ok(())
    }
}
