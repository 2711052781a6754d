//! Network structure: nodes, edges, evidence and file loading.

pub mod file;
pub mod net;
pub mod node;

pub use file::{FileFormat, NetworkFile};
pub use net::BayesNet;
pub use node::{BayesNode, TraversalMark};
