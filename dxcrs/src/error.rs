//! Error types for dxcrs operations

use std::fmt;
use thiserror::Error;

/// Status code carried by every operation result
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    /// Success
    pub const S_OK: HResult = HResult(0);
    /// Generic failure
    pub const E_FAIL: HResult = HResult(0x80004005u32 as i32);
    /// Invalid argument
    pub const E_INVALIDARG: HResult = HResult(0x80070057u32 as i32);
    /// Offset or length outside the bounds of a buffer
    pub const E_BOUNDS: HResult = HResult(0x8000000Bu32 as i32);
    /// Requested view is not supported
    pub const E_NOINTERFACE: HResult = HResult(0x80004002u32 as i32);
    /// Element not found
    pub const E_NOT_FOUND: HResult = HResult(0x80070490u32 as i32);
    /// Malformed container, module or text
    pub const E_FORMAT: HResult = HResult(0x80AA0001u32 as i32);
    /// Syntax or semantic errors in source text
    pub const E_SOURCE: HResult = HResult(0x80AA0002u32 as i32);
    /// Invalid profile, entry point, argument or pass name
    pub const E_CONFIGURATION: HResult = HResult(0x80AA0003u32 as i32);
    /// Container failed validation
    pub const E_VALIDATION: HResult = HResult(0x80AA0004u32 as i32);
    /// I/O failure while reading input
    pub const E_IO: HResult = HResult(0x80AA0005u32 as i32);

    /// Returns true if the result indicates success
    #[inline]
    pub fn is_success(&self) -> bool {
        self.0 >= 0
    }

    /// Returns true if the result indicates an error
    #[inline]
    pub fn is_error(&self) -> bool {
        self.0 < 0
    }

    /// Returns the raw status value
    #[inline]
    pub fn code(&self) -> i32 {
        self.0
    }

    /// Maps a failure status onto its error class.
    ///
    /// Returns `None` for success and for codes outside the known set.
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match *self {
            HResult::E_INVALIDARG | HResult::E_BOUNDS | HResult::E_NOINTERFACE => {
                ErrorKind::Usage
            }
            HResult::E_FORMAT => ErrorKind::Format,
            HResult::E_SOURCE => ErrorKind::Source,
            HResult::E_NOT_FOUND => ErrorKind::ResourceNotFound,
            HResult::E_CONFIGURATION => ErrorKind::Configuration,
            HResult::E_VALIDATION => ErrorKind::Validation,
            HResult::E_IO => ErrorKind::Io,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult(0x{:08x})", self.0 as u32)
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0 as u32)
    }
}

impl From<i32> for HResult {
    fn from(hr: i32) -> Self {
        HResult(hr)
    }
}

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller bug: bad index, bad flags, unsupported view
    Usage,
    /// Malformed container or module
    Format,
    /// Syntax or semantic problem in source text
    Source,
    /// Include or file lookup miss
    ResourceNotFound,
    /// Invalid profile, entry point, argument or pass
    Configuration,
    /// Container rejected by the validator
    Validation,
    /// Reading input failed
    Io,
}

/// Error type for dxcrs operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameter provided
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Byte range outside of a blob
    #[error("Range {offset}+{length} is out of bounds for a blob of {size} bytes")]
    OutOfRange {
        /// Start of the requested range
        offset: usize,
        /// Length of the requested range
        length: usize,
        /// Size of the blob
        size: usize,
    },

    /// Part or pass index past the end
    #[error("Index {index} is out of range (count {count})")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of elements
        count: usize,
    },

    /// A part does not offer the requested reflection view
    #[error("Part '{kind}' does not support {capability:?} reflection")]
    UnsupportedCapability {
        /// Part kind
        kind: crate::PartKind,
        /// Requested view
        capability: crate::ReflectionCapability,
    },

    /// No part of the requested kind
    #[error("Container has no '{0}' part")]
    PartNotFound(crate::PartKind),

    /// Malformed binary data
    #[error("Format error: {0}")]
    Format(String),

    /// Code page without a converter
    #[error("Unsupported code page {0}")]
    UnsupportedCodePage(u32),

    /// Bytes are not valid in their declared encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Shader compilation failed
    #[error("Compilation failed: {message}")]
    Compilation {
        /// Status of the failed operation
        hresult: HResult,
        /// Diagnostics text
        message: String,
    },

    /// Preprocessing failed
    #[error("Preprocessing failed: {message}")]
    Preprocessing {
        /// Status of the failed operation
        hresult: HResult,
        /// Diagnostics text
        message: String,
    },

    /// Optimizer run failed
    #[error("Optimization failed: {message}")]
    Optimization {
        /// Status of the failed operation
        hresult: HResult,
        /// Diagnostics text
        message: String,
    },

    /// Validation failed
    #[error("Validation failed: {message}")]
    Validation {
        /// Status of the failed operation
        hresult: HResult,
        /// Diagnostics text
        message: String,
    },

    /// Assembly failed
    #[error("Assembly failed: {message}")]
    Assembly {
        /// Status of the failed operation
        hresult: HResult,
        /// Diagnostics text
        message: String,
    },

    /// Disassembly failed
    #[error("Disassembly failed: {message}")]
    Disassembly {
        /// Status of the failed operation
        hresult: HResult,
        /// Diagnostics text
        message: String,
    },

    /// Include file not found
    #[error("Include file not found: {0}")]
    IncludeNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the compilation engine
    #[error(transparent)]
    Engine(#[from] dxcompiler::Error),
}

impl Error {
    /// Status an operation result carries for this error
    pub fn hresult(&self) -> HResult {
        match self {
            Error::InvalidParameter(_) | Error::IndexOutOfRange { .. } => HResult::E_INVALIDARG,
            Error::OutOfRange { .. } => HResult::E_BOUNDS,
            Error::UnsupportedCapability { .. } => HResult::E_NOINTERFACE,
            Error::PartNotFound(_) | Error::IncludeNotFound(_) => HResult::E_NOT_FOUND,
            Error::Format(_) | Error::Encoding(_) => HResult::E_FORMAT,
            Error::UnsupportedCodePage(_) => HResult::E_INVALIDARG,
            Error::Compilation { hresult, .. }
            | Error::Preprocessing { hresult, .. }
            | Error::Optimization { hresult, .. }
            | Error::Validation { hresult, .. }
            | Error::Assembly { hresult, .. }
            | Error::Disassembly { hresult, .. } => *hresult,
            Error::Io(_) => HResult::E_IO,
            Error::Engine(err) => match err {
                dxcompiler::Error::UnknownProfile(_) => HResult::E_CONFIGURATION,
                _ => HResult::E_FORMAT,
            },
        }
    }

    /// Error class of [`Error::hresult`]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.hresult().kind()
    }
}

/// Result type for dxcrs operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hresult_display() {
        assert_eq!(HResult::E_FAIL.to_string(), "0x80004005");
        assert_eq!(format!("{:?}", HResult::S_OK), "HResult(0x00000000)");
        assert!(HResult::S_OK.is_success());
        assert!(HResult::E_SOURCE.is_error());
    }

    #[test]
    fn test_hresult_kinds() {
        assert_eq!(HResult::S_OK.kind(), None);
        assert_eq!(HResult::E_FAIL.kind(), None);
        assert_eq!(HResult::E_BOUNDS.kind(), Some(ErrorKind::Usage));
        assert_eq!(HResult::E_NOINTERFACE.kind(), Some(ErrorKind::Usage));
        assert_eq!(HResult::E_NOT_FOUND.kind(), Some(ErrorKind::ResourceNotFound));
        assert_eq!(HResult::E_CONFIGURATION.kind(), Some(ErrorKind::Configuration));
    }

    #[test]
    fn test_error_status() {
        let err = Error::OutOfRange {
            offset: 4,
            length: 8,
            size: 10,
        };
        assert_eq!(err.hresult(), HResult::E_BOUNDS);
        assert_eq!(err.kind(), Some(ErrorKind::Usage));
        let err = Error::from(dxcompiler::Error::UnknownProfile("ps_5_0".to_string()));
        assert_eq!(err.kind(), Some(ErrorKind::Configuration));
    }
}
