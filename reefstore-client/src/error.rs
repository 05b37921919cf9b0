//! Error types for the client data path
//!
//! The taxonomy mirrors how failures are scoped: malformed input is fatal
//! to its decode, connection-level failures are scoped to a single OSD and
//! never abort sibling fragment fetches, and registry failures distinguish
//! "refresh failed" from "never populated at all".

use reefstore_core::{ContinuableError, DecodeError, OsdId};
use reefstore_wire::WireError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Unified error type for the client data path
#[derive(Error, Debug)]
pub enum ClientError {
    // ===== Malformed Input =====
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("manifest decode error: {0}")]
    Decode(#[from] DecodeError),

    // ===== Remote Status =====
    #[error("proxy returned status {rc}: {message}")]
    ProxyStatus { rc: u32, message: String },

    #[error("osd returned status {rc}")]
    OsdStatus { rc: u32 },

    // ===== Connection Failures (scoped to one OSD) =====
    #[error("connection failure on osd {osd}: {reason}")]
    Connection { osd: OsdId, reason: String },

    #[error("osd {0} not present in the current registry")]
    UnknownOsd(OsdId),

    #[error("osd {0} is disqualified after repeated failures")]
    OsdDisqualified(OsdId),

    #[error("fragment not present on osd {osd}")]
    FragmentMissing { osd: OsdId },

    // ===== Registry =====
    #[error("osd registry initial population failed")]
    RegistryUnavailable,

    // ===== Transport =====
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ContinuableError> for ClientError {
    fn from(err: ContinuableError) -> Self {
        ClientError::Decode(err.error)
    }
}
