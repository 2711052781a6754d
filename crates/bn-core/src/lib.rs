//! Discrete Bayesian networks.
//!
//! This library provides:
//! - Probability tables (CPT, joint, per-node marginals) over mixed-radix keys
//! - A DAG of discrete nodes with evidence and graph queries
//! - Rejection, likelihood-weighted and Gibbs sampling
//! - Kim-Pearl belief propagation
//! - Maximum-likelihood parameter learning
//! - Network and config file formats for the `bnet` binary
//!
//! The binary entry point is in `main.rs`.
//!
//! ```rust
//! use bn_core::inference::{infer_marginals, Engine};
//! use bn_core::config::InferenceConfig;
//! use bn_core::network::BayesNet;
//!
//! let mut net = BayesNet::new(&[2, 2]).unwrap();
//! net.add_edge(0, 1).unwrap();
//! net.set_probabilities(1, &[0], &[0.9, 0.1]).unwrap();
//! net.set_probabilities(1, &[1], &[0.2, 0.8]).unwrap();
//! net.set_evidence(1, 1).unwrap();
//!
//! let outcome = infer_marginals(&net, Engine::Belief, &InferenceConfig::default()).unwrap();
//! assert_eq!(outcome.marginals.most_probable_state(0).unwrap(), 1);
//! ```

pub mod config;
pub mod exit_codes;
pub mod inference;
pub mod learning;
pub mod logging;
pub mod network;
pub mod report;
pub mod table;

pub use bn_common::{Error, Result};
