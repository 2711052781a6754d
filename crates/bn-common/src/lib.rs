//! Shared types for the bayesnet workspace.
//!
//! This crate provides foundational types used by `bn-core`:
//! - The unified error type with stable codes and categories
//! - Output format specifications for the CLI

pub mod error;
pub mod output;

pub use error::{Error, ErrorCategory, Result, StructuredError};
pub use output::OutputFormat;
