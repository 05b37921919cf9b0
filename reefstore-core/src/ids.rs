//! Cluster-wide identifier types
//!
//! OSD and namespace ids share a compact integer wire form: values below
//! `i32::MAX` travel as a plain u32; larger values write the `i32::MAX`
//! marker followed by the full u64. The big-endian variant is used where
//! keys must sort consistently across the cluster.

use reefstore_wire::{Message, MessageBuilder, Result, WireDecode, WireEncode};
use std::fmt;

/// Storage-cluster identity ("alba level" generation id).
pub type AlbaId = String;

const COMPACT_MARKER: u32 = i32::MAX as u32;

fn encode_compact(value: u64, mb: &mut MessageBuilder) {
    if value < u64::from(COMPACT_MARKER) {
        (value as u32).encode(mb);
    } else {
        COMPACT_MARKER.encode(mb);
        value.encode(mb);
    }
}

fn decode_compact(m: &mut Message) -> Result<u64> {
    let small = u32::decode(m)?;
    if small < COMPACT_MARKER {
        Ok(u64::from(small))
    } else {
        u64::decode(m)
    }
}

fn encode_compact_be(value: u64, mb: &mut MessageBuilder) {
    if value < u64::from(COMPACT_MARKER) {
        mb.put_u32_be(value as u32);
    } else {
        mb.put_u32_be(COMPACT_MARKER);
        mb.put_u64_be(value);
    }
}

/// Identity of one remote storage daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OsdId(pub u64);

impl OsdId {
    /// Big-endian compact form, for cluster-consistent key encoding.
    pub fn encode_be(&self, mb: &mut MessageBuilder) {
        encode_compact_be(self.0, mb);
    }
}

impl WireEncode for OsdId {
    fn encode(&self, mb: &mut MessageBuilder) {
        encode_compact(self.0, mb);
    }
}

impl WireDecode for OsdId {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(OsdId(decode_compact(m)?))
    }
}

impl fmt::Display for OsdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a namespace within a storage cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub u64);

impl NamespaceId {
    pub fn encode_be(&self, mb: &mut MessageBuilder) {
        encode_compact_be(self.0, mb);
    }
}

impl WireEncode for NamespaceId {
    fn encode(&self, mb: &mut MessageBuilder) {
        encode_compact(self.0, mb);
    }
}

impl WireDecode for NamespaceId {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(NamespaceId(decode_compact(m)?))
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
