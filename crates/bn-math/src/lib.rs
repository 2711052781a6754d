//! bayesnet math utilities.

pub mod math;

pub use math::probability::*;
pub use math::stable::*;
