//! Bytecode errors

use thiserror::Error;

/// Errors that can occur while decoding a module image
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    /// Format version tag does not match this runtime
    #[error("Unsupported format version: {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the header
        found: i32,
        /// Version this reader understands
        expected: i32,
    },

    /// Stream ended inside a value
    #[error("Unexpected end of bytecode at offset {offset} (needed {needed} bytes)")]
    UnexpectedEnd {
        /// Byte offset where the read started
        offset: usize,
        /// Bytes the read required
        needed: usize,
    },

    /// Negative or otherwise impossible length prefix
    #[error("Invalid length {length} at offset {offset}")]
    InvalidLength {
        /// Length read
        length: i64,
        /// Byte offset of the prefix
        offset: usize,
    },

    /// Count prefix promises more entries than the input can hold
    #[error("Count {count} at offset {offset} exceeds the {remaining} bytes left")]
    CountOverflow {
        /// Count read
        count: usize,
        /// Byte offset of the prefix
        offset: usize,
        /// Bytes left after the prefix
        remaining: usize,
    },

    /// Length does not fit in its wire prefix
    #[error("Length {length} does not fit in an i{width} prefix")]
    LengthOverflow {
        /// Length to write
        length: usize,
        /// Prefix width in bits
        width: u32,
    },

    /// String payload was not UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Unknown type code
    #[error("Invalid type code: {0}")]
    InvalidTypeCode(i32),

    /// Unknown generic constraint kind
    #[error("Invalid generic constraint kind: {0}")]
    InvalidConstraint(i32),

    /// Constant text could not be parsed as its declared type
    #[error("Invalid constant '{name}' of type {type_code}: '{text}'")]
    InvalidConstant {
        /// Constant key
        name: String,
        /// Declared type code
        type_code: i32,
        /// Raw value text
        text: String,
    },

    /// Block length prefix disagrees with what its content consumed
    #[error("Block at offset {offset} declared {declared} bytes but used {used}")]
    BlockMismatch {
        /// Byte offset of the block
        offset: usize,
        /// Declared length
        declared: usize,
        /// Bytes consumed by the decoder
        used: usize,
    },
}

/// Result type for bytecode operations
pub type Result<T> = std::result::Result<T, BytecodeError>;
