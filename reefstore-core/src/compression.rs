//! Fragment compression identifiers
//!
//! A closed variant set dispatched on a one-byte wire tag. The algorithms
//! themselves are opaque collaborators of the data path; only the
//! identifier travels here. There is no forward compatibility for
//! algorithm tags: an unknown tag always fails the decode.

use reefstore_wire::{Message, MessageBuilder, Result, WireDecode, WireEncode, WireError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    NoCompression,
    Snappy,
    Bzip2,
    Test,
}

impl Compression {
    fn tag(&self) -> u8 {
        match self {
            Compression::NoCompression => 1,
            Compression::Snappy => 2,
            Compression::Bzip2 => 3,
            Compression::Test => 4,
        }
    }
}

impl WireEncode for Compression {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_type_tag(self.tag());
    }
}

impl WireDecode for Compression {
    fn decode(m: &mut Message) -> Result<Self> {
        match u8::decode(m)? {
            1 => Ok(Compression::NoCompression),
            2 => Ok(Compression::Snappy),
            3 => Ok(Compression::Bzip2),
            4 => Ok(Compression::Test),
            tag => {
                tracing::warn!(tag, "unknown compression tag");
                Err(WireError::UnknownTag {
                    kind: "compression",
                    tag,
                })
            }
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::NoCompression => write!(f, "none"),
            Compression::Snappy => write!(f, "snappy"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Test => write!(f, "test"),
        }
    }
}
