//! Error types for bayesnet.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 20,
//!   "category": "table",
//!   "message": "no table entry for key [2, 0]",
//!   "recoverable": false,
//!   "context": { "key": [2, 0] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for bayesnet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Graph structure and node addressing errors.
    Network,
    /// Probability table lookups and normalization.
    Table,
    /// Sampling and belief propagation failures.
    Inference,
    /// Parameter learning and dataset errors.
    Learning,
    /// Configuration and network file errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Table => write!(f, "table"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Learning => write!(f, "learning"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for bayesnet.
#[derive(Error, Debug)]
pub enum Error {
    // Network errors (10-19)
    #[error("node index {index} out of range for network of {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("state {state} out of range for node {node} with {state_count} states")]
    StateOutOfRange {
        node: usize,
        state: usize,
        state_count: usize,
    },

    #[error("node {node} has {state_count} states; at least 2 are required")]
    InvalidStateCount { node: usize, state_count: usize },

    #[error("edge {parent} -> {child} would create a directed cycle")]
    CycleDetected { parent: usize, child: usize },

    // Table errors (20-29)
    #[error("no table entry for key {key:?}")]
    KeyNotFound { key: Vec<usize> },

    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("cannot normalize: {0}")]
    DegenerateNormalization(String),

    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("state {state} out of range for table with {state_count} states")]
    TableStateOutOfRange { state: usize, state_count: usize },

    #[error("table over {variables} variables exceeds the limit of {limit} cells")]
    TableTooLarge { variables: usize, limit: usize },

    // Inference errors (30-39)
    #[error("all {cycles} samples were rejected by the evidence")]
    AllSamplesRejected { cycles: usize },

    #[error("network is not singly connected; exact belief propagation requires a polytree")]
    NotSinglyConnected,

    #[error("inference engine not initialized: {0}")]
    NotInitialized(String),

    // Learning errors (40-49)
    #[error("dataset line {line}: {message}")]
    Dataset { line: usize, message: String },

    // Configuration errors (50-59)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Network errors
    /// - 20-29: Table errors
    /// - 30-39: Inference errors
    /// - 40-49: Learning errors
    /// - 50-59: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::IndexOutOfRange { .. } => 10,
            Error::StateOutOfRange { .. } => 11,
            Error::InvalidStateCount { .. } => 12,
            Error::CycleDetected { .. } => 13,
            Error::KeyNotFound { .. } => 20,
            Error::ShapeMismatch { .. } => 21,
            Error::DegenerateNormalization(_) => 22,
            Error::InvalidDistribution(_) => 23,
            Error::TableStateOutOfRange { .. } => 24,
            Error::TableTooLarge { .. } => 25,
            Error::AllSamplesRejected { .. } => 30,
            Error::NotSinglyConnected => 31,
            Error::NotInitialized(_) => 32,
            Error::Dataset { .. } => 40,
            Error::Config(_) => 50,
            Error::Toml(_) => 51,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::IndexOutOfRange { .. }
            | Error::StateOutOfRange { .. }
            | Error::InvalidStateCount { .. }
            | Error::CycleDetected { .. } => ErrorCategory::Network,

            Error::KeyNotFound { .. }
            | Error::ShapeMismatch { .. }
            | Error::DegenerateNormalization(_)
            | Error::InvalidDistribution(_)
            | Error::TableStateOutOfRange { .. }
            | Error::TableTooLarge { .. } => ErrorCategory::Table,

            Error::AllSamplesRejected { .. }
            | Error::NotSinglyConnected
            | Error::NotInitialized(_) => ErrorCategory::Inference,

            Error::Dataset { .. } => ErrorCategory::Learning,

            Error::Config(_) | Error::Toml(_) => ErrorCategory::Config,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// Recoverable errors may be resolved by rerunning with different
    /// parameters (more samples, other evidence, a fixed input file)
    /// without changing the network structure.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Structural: the caller built the wrong network
            Error::IndexOutOfRange { .. } => false,
            Error::StateOutOfRange { .. } => false,
            Error::InvalidStateCount { .. } => false,
            Error::CycleDetected { .. } => false,

            Error::KeyNotFound { .. } => false,
            Error::ShapeMismatch { .. } => false,
            Error::DegenerateNormalization(_) => true,
            Error::InvalidDistribution(_) => true,
            Error::TableStateOutOfRange { .. } => false,
            Error::TableTooLarge { .. } => false,

            // More cycles or a different engine may succeed
            Error::AllSamplesRejected { .. } => true,
            Error::NotSinglyConnected => true,
            Error::NotInitialized(_) => true,

            Error::Dataset { .. } => true,
            Error::Config(_) => true,
            Error::Toml(_) => true,
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::IndexOutOfRange { .. } => "Check node indices against the network size.",
            Error::StateOutOfRange { .. } => {
                "Evidence and assignments must use a state index below the node's state count."
            }
            Error::InvalidStateCount { .. } => "Every variable needs at least two states.",
            Error::CycleDetected { .. } => {
                "Bayesian networks must be acyclic. Remove or reverse one edge of the cycle."
            }
            Error::KeyNotFound { .. } => {
                "Parent-state keys must list one state per parent, in edge insertion order."
            }
            Error::ShapeMismatch { .. } => {
                "Supply exactly one probability per state (or one state per variable)."
            }
            Error::DegenerateNormalization(_) => {
                "The table has no probability mass. Set non-zero probabilities before normalizing."
            }
            Error::InvalidDistribution(_) => {
                "Probabilities must be finite and non-negative with a positive total."
            }
            Error::TableStateOutOfRange { .. } => {
                "State indices must be below the variable's state count."
            }
            Error::TableTooLarge { .. } => {
                "Reduce the number of parents (or states) of the node, or use a sampler instead of enumeration."
            }
            Error::AllSamplesRejected { .. } => {
                "Evidence is rare under the prior. Increase iterations or use likelihood weighting."
            }
            Error::NotSinglyConnected => {
                "Use a sampling engine, or disable strict topology to accept approximate beliefs."
            }
            Error::NotInitialized(_) => "Call initial_tree before update_tree.",
            Error::Dataset { .. } => {
                "Each dataset row needs one state index per node, separated by commas or spaces."
            }
            Error::Config(_) => "Check the configuration file against the documented fields.",
            Error::Toml(_) => "Fix the TOML syntax in the configuration or network file.",
            Error::Io(_) => "Check that the file exists and is readable.",
            Error::Json(_) => "Invalid JSON in file. Check syntax with 'jq . <file>'.",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., node index, key).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::IndexOutOfRange { index, len } => {
                context.insert("index".to_string(), serde_json::json!(index));
                context.insert("len".to_string(), serde_json::json!(len));
            }
            Error::StateOutOfRange { node, state, .. } => {
                context.insert("node".to_string(), serde_json::json!(node));
                context.insert("state".to_string(), serde_json::json!(state));
            }
            Error::CycleDetected { parent, child } => {
                context.insert("parent".to_string(), serde_json::json!(parent));
                context.insert("child".to_string(), serde_json::json!(child));
            }
            Error::KeyNotFound { key } => {
                context.insert("key".to_string(), serde_json::json!(key));
            }
            Error::Dataset { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            Error::TableTooLarge { variables, limit } => {
                context.insert("variables".to_string(), serde_json::json!(variables));
                context.insert("limit".to_string(), serde_json::json!(limit));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// error: [message]
///   fix: [remediation hint]
/// ```
pub fn format_error_human(err: &Error) -> String {
    format!("error: {}\n  fix: {}", err, err.remediation())
}
