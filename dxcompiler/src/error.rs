//! Error types for engine operations

use thiserror::Error;

/// Error type for engine operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Intermediate module text could not be parsed
    #[error("line {line}: {message}")]
    IrSyntax {
        /// 1-based line of the offending text
        line: usize,
        /// What was wrong with it
        message: String,
    },

    /// Binary data ended early or held an impossible value
    #[error("malformed data at offset {offset}: {message}")]
    Decode {
        /// Byte offset where decoding stopped
        offset: usize,
        /// What was wrong with it
        message: String,
    },

    /// A module broke one of its structural rules
    #[error("module verification failed: {0}")]
    Verify(String),

    /// Target profile string is not a known profile
    #[error("unknown target profile '{0}'")]
    UnknownProfile(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
