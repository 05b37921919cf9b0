//! Error types for manifest decoding
//!
//! `DecodeError` is fatal to the decode at hand. `ContinuableError` is the
//! one exception the batch paths rely on: when a manifest record fails to
//! parse but the cursor already sits past the versioned body, the trailing
//! namespace id is still recovered so the caller can skip the record and
//! stay aligned for the next one.

use crate::ids::NamespaceId;
use reefstore_wire::WireError;
use thiserror::Error;

/// Result type alias for model decode/encode operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Malformed manifest or topology input
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("snappy transform failed: {0}")]
    Snappy(String),

    #[error("fragment layout matrices disagree in shape")]
    LayoutShapeMismatch,

    #[error("manifest carries {fragments} fragment rows for {chunks} chunk sizes")]
    ChunkCountMismatch { fragments: usize, chunks: usize },
}

/// A manifest decode failure that may still have recovered the trailing
/// namespace id.
///
/// `namespace_id` is `Some` only when the decoder had consumed the whole
/// versioned body before failing, i.e. the suffix was statically known to
/// sit at the cursor. Batch readers treat that case as "log and skip one
/// record"; `None` means the cursor position is unreliable and the failure
/// must propagate.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct ContinuableError {
    pub error: DecodeError,
    pub namespace_id: Option<NamespaceId>,
}

impl ContinuableError {
    pub fn is_continuable(&self) -> bool {
        self.namespace_id.is_some()
    }
}
