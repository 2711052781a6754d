//! Parameter learning from complete data.

pub mod dataset;
pub mod mle;

pub use dataset::Dataset;
pub use mle::{log_likelihood, MaximumLikelihoodLearner};
