//! Command payloads written to stdout by `bnet`.
//!
//! Each report serializes to JSON as-is and renders to Markdown or a terse
//! summary for terminals.

use std::fmt::Write as _;

use bn_common::{OutputFormat, Result};
use serde::Serialize;

use crate::config::ResolvedConfig;
use crate::inference::{Engine, InferenceOutcome};
use crate::network::{BayesNet, NetworkFile};

/// Report schema version, bumped on breaking field changes.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Rendering shared by every report.
pub trait Report: Serialize {
    fn markdown(&self) -> String;
    fn summary(&self) -> String;

    fn render(&self, format: OutputFormat) -> Result<String> {
        Ok(match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
            OutputFormat::Md => self.markdown(),
            OutputFormat::Summary => self.summary(),
        })
    }
}

/// Where the network came from.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub schema_version: &'static str,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// SHA-256 of the network file.
    pub digest: String,
    /// Inference config file, when one was loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_digest: Option<String>,
}

impl Provenance {
    pub fn new(run_id: String, file: &NetworkFile, digest: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            network: file.name.clone(),
            digest,
            config: None,
            config_digest: None,
        }
    }

    /// Record the config file the run was resolved from.
    pub fn with_config(mut self, resolved: &ResolvedConfig) -> Self {
        self.config = resolved.path.as_ref().map(|p| p.display().to_string());
        self.config_digest = resolved.hash.clone();
        self
    }

    fn title(&self) -> &str {
        self.network.as_deref().unwrap_or("network")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateProbability {
    pub state: String,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeMarginal {
    pub node: String,
    pub most_probable: String,
    pub states: Vec<StateProbability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub node: String,
    pub state: String,
}

/// Output of `bnet infer`.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceReport {
    #[serde(flatten)]
    pub provenance: Provenance,
    pub engine: Engine,
    pub iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub singly_connected: Option<bool>,
    pub evidence: Vec<Observation>,
    pub marginals: Vec<NodeMarginal>,
}

impl InferenceReport {
    pub fn new(provenance: Provenance, file: &NetworkFile, net: &BayesNet, outcome: &InferenceOutcome) -> Result<Self> {
        let name = |i: usize| file.nodes.get(i).map_or_else(|| i.to_string(), |n| n.name.clone());
        let evidence = net
            .evidence_nodes()
            .into_iter()
            .filter_map(|i| {
                net.nodes()[i].evidence().map(|s| Observation {
                    node: name(i),
                    state: file.state_name(i, s),
                })
            })
            .collect();
        let marginals = (0..net.len())
            .map(|i| {
                let row = outcome.marginals.variable(i)?;
                let best = outcome.marginals.most_probable_state(i)?;
                Ok(NodeMarginal {
                    node: name(i),
                    most_probable: file.state_name(i, best),
                    states: row
                        .iter()
                        .enumerate()
                        .map(|(s, &p)| StateProbability {
                            state: file.state_name(i, s),
                            probability: p,
                        })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            provenance,
            engine: outcome.engine,
            iterations: outcome.iterations,
            converged: outcome.converged,
            singly_connected: outcome.singly_connected,
            evidence,
            marginals,
        })
    }
}

impl Report for InferenceReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Posterior marginals: {}\n", self.provenance.title());
        let _ = writeln!(out, "- engine: `{}`", self.engine);
        let _ = writeln!(out, "- iterations: {}", self.iterations);
        if let Some(converged) = self.converged {
            let _ = writeln!(out, "- converged: {}", converged);
        }
        if self.singly_connected == Some(false) {
            let _ = writeln!(out, "- note: network has loops; beliefs are approximate");
        }
        if !self.evidence.is_empty() {
            let observed: Vec<String> = self
                .evidence
                .iter()
                .map(|e| format!("{}={}", e.node, e.state))
                .collect();
            let _ = writeln!(out, "- evidence: {}", observed.join(", "));
        }
        let _ = writeln!(out, "\n| node | state | probability |");
        let _ = writeln!(out, "|---|---|---|");
        for node in &self.marginals {
            for s in &node.states {
                let marker = if s.state == node.most_probable { " *" } else { "" };
                let _ = writeln!(out, "| {} | {}{} | {:.4} |", node.node, s.state, marker, s.probability);
            }
        }
        out
    }

    fn summary(&self) -> String {
        let mut out = String::new();
        for node in &self.marginals {
            let p = node
                .states
                .iter()
                .find(|s| s.state == node.most_probable)
                .map_or(0.0, |s| s.probability);
            let _ = writeln!(out, "{}: {} ({:.3})", node.node, node.most_probable, p);
        }
        out
    }
}

/// Output of `bnet check`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    #[serde(flatten)]
    pub provenance: Provenance,
    pub nodes: usize,
    pub edges: usize,
    pub topological_order: Vec<String>,
    pub roots: Vec<String>,
    pub leaves: Vec<String>,
    pub singly_connected: bool,
}

impl CheckReport {
    pub fn new(provenance: Provenance, net: &BayesNet) -> Result<Self> {
        let name = |i: usize| net.label(i).ok().flatten().map_or_else(|| i.to_string(), str::to_string);
        let mut roots = Vec::new();
        let mut leaves = Vec::new();
        for i in 0..net.len() {
            if net.is_root(i)? {
                roots.push(name(i));
            }
            if net.is_leaf(i)? {
                leaves.push(name(i));
            }
        }
        Ok(Self {
            provenance,
            nodes: net.len(),
            edges: net.nodes().iter().map(|n| n.children().len()).sum(),
            topological_order: net.topological_order().into_iter().map(name).collect(),
            roots,
            leaves,
            singly_connected: net.is_singly_connected(),
        })
    }
}

impl Report for CheckReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Network check: {}\n", self.provenance.title());
        let _ = writeln!(out, "- nodes: {}", self.nodes);
        let _ = writeln!(out, "- edges: {}", self.edges);
        let _ = writeln!(out, "- topological order: {}", self.topological_order.join(" → "));
        let _ = writeln!(out, "- roots: {}", self.roots.join(", "));
        let _ = writeln!(out, "- leaves: {}", self.leaves.join(", "));
        let _ = writeln!(out, "- singly connected: {}", self.singly_connected);
        out
    }

    fn summary(&self) -> String {
        format!(
            "{}: {} nodes, {} edges, {}\n",
            self.provenance.title(),
            self.nodes,
            self.edges,
            if self.singly_connected { "polytree" } else { "loopy" }
        )
    }
}

/// Output of `bnet learn --output`.
#[derive(Debug, Clone, Serialize)]
pub struct LearnReport {
    #[serde(flatten)]
    pub provenance: Provenance,
    pub rows: usize,
    pub smoothing: f64,
    pub log_likelihood_before: f64,
    pub log_likelihood_after: f64,
    pub output: String,
}

impl Report for LearnReport {
    fn markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Learned parameters: {}\n", self.provenance.title());
        let _ = writeln!(out, "- rows: {}", self.rows);
        let _ = writeln!(out, "- smoothing: {}", self.smoothing);
        let _ = writeln!(
            out,
            "- log-likelihood: {:.4} → {:.4}",
            self.log_likelihood_before, self.log_likelihood_after
        );
        let _ = writeln!(out, "- written to: `{}`", self.output);
        out
    }

    fn summary(&self) -> String {
        format!(
            "learned from {} rows, log-likelihood {:.4} -> {:.4}, wrote {}\n",
            self.rows, self.log_likelihood_before, self.log_likelihood_after, self.output
        )
    }
}
