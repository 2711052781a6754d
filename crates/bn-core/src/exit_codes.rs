//! Exit codes for the `bnet` CLI.
//!
//! Exit code ranges:
//! - 0: success
//! - 10-19: user errors (bad arguments, invalid input, failed inference)
//! - 20-29: internal and I/O errors

use bn_common::{Error, ErrorCategory};

/// Process exit codes. Stable for scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed.
    Clean = 0,

    // ========================================================================
    // User Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Network, dataset or config file is malformed or inconsistent
    InvalidInput = 11,

    /// Inference failed (impossible evidence, loopy graph under strict mode)
    InferenceError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes 10-19; the user can fix these.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Codes 20-29.
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Name used in JSON error output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InvalidInput => "ERR_INVALID_INPUT",
            ExitCode::InferenceError => "ERR_INFERENCE",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        // Malformed JSON is bad input, not a failed read.
        if matches!(err, Error::Json(_)) {
            return ExitCode::InvalidInput;
        }
        match err.category() {
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Inference => ExitCode::InferenceError,
            ErrorCategory::Network
            | ErrorCategory::Table
            | ErrorCategory::Learning
            | ErrorCategory::Config => ExitCode::InvalidInput,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
