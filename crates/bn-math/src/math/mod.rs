//! Core math modules.

pub mod probability;
pub mod stable;
