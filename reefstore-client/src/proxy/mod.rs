//! Proxy protocol and client
//!
//! The proxy is the manifest-bearing RPC surface of the data path. Every
//! request is framed as a 4-byte total length followed by a numeric
//! operation tag and its fields; a once-per-connection prologue (magic,
//! protocol version) precedes the first request. Every response opens with
//! a 4-byte status code; a nonzero status carries a length-prefixed error
//! string and no further payload.
//!
//! Namespace CRUD, listing and ping live outside the data path and are not
//! spoken here.

pub mod client;
pub mod messages;
pub mod sequences;

pub use client::{ProxyClient, StoreClient};
pub use messages::{ObjectInfo, ObjectSlices, ProxySlice, SliceDescriptor};
pub use sequences::{Assert, Sequence, Update};

use crate::error::{ClientError, Result};
use bytes::Bytes;
use reefstore_wire::{Message, WireDecode};

pub const PROXY_MAGIC: u32 = 1_148_837_403;
pub const PROXY_VERSION: u32 = 1;

/// Stable numeric operation tags. Values are fixed by deployed peers.
pub mod tag {
    pub const INVALIDATE_CACHE: u32 = 14;
    pub const WRITE_OBJECT_FS2: u32 = 21;
    pub const READ_OBJECTS_SLICES2: u32 = 23;
    pub const APPLY_SEQUENCE: u32 = 24;
    pub const OSD_INFO2: u32 = 28;
    pub const HAS_LOCAL_FRAGMENT_CACHE: u32 = 31;
    pub const GET_FRAGMENT_ENCRYPTION_KEY: u32 = 33;
}

/// Leading status word of every proxy response.
#[derive(Debug, Clone)]
pub struct Status {
    pub rc: u32,
    pub message: Option<String>,
}

impl Status {
    pub fn decode(m: &mut Message) -> Result<Self> {
        let rc = u32::decode(m)?;
        let message = if rc != 0 {
            // the error string is free-form; tolerate imperfect UTF-8
            let raw = Bytes::decode(m)?;
            Some(String::from_utf8_lossy(&raw).into_owned())
        } else {
            None
        };
        Ok(Status { rc, message })
    }

    pub fn is_ok(&self) -> bool {
        self.rc == 0
    }

    pub fn into_result(self) -> Result<()> {
        if self.rc == 0 {
            Ok(())
        } else {
            Err(ClientError::ProxyStatus {
                rc: self.rc,
                message: self.message.unwrap_or_default(),
            })
        }
    }
}
