//! Error type for wire-level decoding
//!
//! Any `WireError` is fatal to the decode in progress; callers never retry
//! a failed decode on the same cursor.

use thiserror::Error;

/// Result type alias for wire operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Malformed or truncated wire input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("nested message of {len} bytes exceeds the {remaining} remaining")]
    NestedOverrun { len: usize, remaining: usize },

    #[error("varint longer than 64 bits")]
    VarintOverflow,

    #[error("unknown {kind} tag {tag}")]
    UnknownTag { kind: &'static str, tag: u8 },

    #[error("unexpected {kind} version {found}")]
    UnexpectedVersion { kind: &'static str, found: u8 },
}
