//! OSD topology types
//!
//! One [`OsdEntry`] per storage daemon: where to reach it and which read
//! paths it supports. Entries are grouped per alba-level (one generation of
//! the cluster topology) into an [`OsdMap`]; the proxy reports the full
//! ordered sequence of levels, newest last.
//!
//! Both the info and the capability record travel as explicit-length nested
//! messages, so fields added by newer daemons are skipped cleanly by older
//! clients.

use crate::ids::{AlbaId, OsdId};
use reefstore_wire::{Message, MessageBuilder, Result, WireDecode, WireEncode};
use std::collections::HashMap;
use std::sync::Arc;

/// Network location of one OSD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsdInfo {
    pub long_id: String,
    pub ips: Vec<String>,
    pub port: u32,
    pub use_rdma: bool,
    pub node_id: String,
}

impl OsdInfo {
    /// Primary transport kind, used when no fast-path override applies.
    pub fn primary_transport(&self) -> &'static str {
        if self.use_rdma {
            "rdma"
        } else {
            "tcp"
        }
    }
}

impl WireEncode for OsdInfo {
    fn encode(&self, mb: &mut MessageBuilder) {
        let mut inner = MessageBuilder::new();
        self.long_id.encode(&mut inner);
        self.ips.encode(&mut inner);
        self.port.encode(&mut inner);
        self.use_rdma.encode(&mut inner);
        self.node_id.encode(&mut inner);
        let body = inner.freeze();
        (body.len() as u32).encode(mb);
        mb.add_raw(&body);
    }
}

impl WireDecode for OsdInfo {
    fn decode(m: &mut Message) -> Result<Self> {
        let len = u32::decode(m)? as usize;
        let mut inner = m.take_nested(len)?;
        Ok(OsdInfo {
            long_id: String::decode(&mut inner)?,
            ips: Vec::<String>::decode(&mut inner)?,
            port: u32::decode(&mut inner)?,
            use_rdma: bool::decode(&mut inner)?,
            node_id: String::decode(&mut inner)?,
        })
    }
}

/// Optional fast-path (rora) parameters advertised by an OSD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsdCapabilities {
    pub rora_port: Option<u32>,
    pub rora_transport: Option<String>,
    pub rora_ips: Option<Vec<String>>,
}

impl OsdCapabilities {
    pub fn supports_rora(&self) -> bool {
        self.rora_port.is_some()
    }
}

impl WireEncode for OsdCapabilities {
    fn encode(&self, mb: &mut MessageBuilder) {
        let mut inner = MessageBuilder::new();
        self.rora_port.encode(&mut inner);
        self.rora_transport.encode(&mut inner);
        self.rora_ips.encode(&mut inner);
        let body = inner.freeze();
        (body.len() as u32).encode(mb);
        mb.add_raw(&body);
    }
}

impl WireDecode for OsdCapabilities {
    fn decode(m: &mut Message) -> Result<Self> {
        let len = u32::decode(m)? as usize;
        let mut inner = m.take_nested(len)?;
        Ok(OsdCapabilities {
            rora_port: Option::<u32>::decode(&mut inner)?,
            rora_transport: Option::<String>::decode(&mut inner)?,
            rora_ips: Option::<Vec<String>>::decode(&mut inner)?,
        })
    }
}

/// Location plus capabilities of one OSD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsdEntry {
    pub info: OsdInfo,
    pub caps: OsdCapabilities,
}

/// All OSDs of one alba-level.
pub type OsdMap = HashMap<OsdId, Arc<OsdEntry>>;

/// Decode one alba-level's OSD map: count, then `(id, info, caps)` entries
/// in forward order (a map body, not a wire sequence).
pub fn decode_osd_map(m: &mut Message) -> Result<OsdMap> {
    let count = u32::decode(m)? as usize;
    // capacity hint bounded by the remaining bytes; the count is untrusted
    let mut map = OsdMap::with_capacity(count.min(m.remaining()));
    for _ in 0..count {
        let id = OsdId::decode(m)?;
        let info = OsdInfo::decode(m)?;
        let caps = OsdCapabilities::decode(m)?;
        map.insert(id, Arc::new(OsdEntry { info, caps }));
    }
    Ok(map)
}

pub fn encode_osd_map(map: &OsdMap, mb: &mut MessageBuilder) {
    (map.len() as u32).encode(mb);
    for (id, entry) in map {
        id.encode(mb);
        entry.info.encode(mb);
        entry.caps.encode(mb);
    }
}

/// Decode the full topology: alba-levels travel as a reversed wire
/// sequence, each one an alba id plus its OSD map.
pub fn decode_osd_maps(m: &mut Message) -> Result<Vec<(AlbaId, OsdMap)>> {
    let count = u32::decode(m)? as usize;
    let mut levels = Vec::with_capacity(count.min(m.remaining()));
    for _ in 0..count {
        let alba_id = String::decode(m)?;
        let map = decode_osd_map(m)?;
        levels.push((alba_id, map));
    }
    levels.reverse();
    Ok(levels)
}

pub fn encode_osd_maps(levels: &[(AlbaId, OsdMap)], mb: &mut MessageBuilder) {
    (levels.len() as u32).encode(mb);
    for (alba_id, map) in levels.iter().rev() {
        alba_id.encode(mb);
        encode_osd_map(map, mb);
    }
}
