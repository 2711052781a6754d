//! Probability tables.
//!
//! - [`ConditionalProbabilityTable`]: `P(X | parents)` for one node
//! - [`JointProbabilityTable`]: dense joint over all nodes
//! - [`MarginalProbabilityTable`]: one distribution per node
//!
//! All three share the row ordering defined in [`odometer`].

pub mod cpt;
pub mod joint;
pub mod marginal;
pub mod odometer;

pub use cpt::{ConditionalProbabilityTable, CptRow};
pub use joint::JointProbabilityTable;
pub use marginal::MarginalProbabilityTable;
pub use odometer::StateOdometer;
