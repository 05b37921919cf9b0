//! Checksum values and verification
//!
//! A checksum is a tagged algorithm identifier plus its digest. Each
//! embedding entity (fragment, manifest) owns its checksum exclusively;
//! checksums are never shared between entities.

use bytes::Bytes;
use reefstore_wire::{Message, MessageBuilder, Result, WireDecode, WireEncode, WireError};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    NoChecksum,
    Sha1(Bytes),
    Crc32c(u32),
}

impl Checksum {
    /// Compute the SHA-1 checksum of `data`.
    pub fn sha1_of(data: &[u8]) -> Self {
        let digest = ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, data);
        Checksum::Sha1(Bytes::copy_from_slice(digest.as_ref()))
    }

    /// Compute the CRC-32C (Castagnoli) checksum of `data`.
    pub fn crc32c_of(data: &[u8]) -> Self {
        Checksum::Crc32c(crc32c::crc32c(data))
    }

    /// Verify `data` against this checksum. `NoChecksum` verifies anything.
    pub fn verify(&self, data: &[u8]) -> bool {
        match self {
            Checksum::NoChecksum => true,
            Checksum::Sha1(digest) => {
                let computed =
                    ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, data);
                computed.as_ref() == digest.as_ref()
            }
            Checksum::Crc32c(crc) => crc32c::crc32c(data) == *crc,
        }
    }
}

impl WireEncode for Checksum {
    fn encode(&self, mb: &mut MessageBuilder) {
        match self {
            Checksum::NoChecksum => mb.add_type_tag(1),
            Checksum::Sha1(digest) => {
                mb.add_type_tag(2);
                digest.encode(mb);
            }
            Checksum::Crc32c(crc) => {
                mb.add_type_tag(3);
                crc.encode(mb);
            }
        }
    }
}

impl WireDecode for Checksum {
    fn decode(m: &mut Message) -> Result<Self> {
        match u8::decode(m)? {
            1 => Ok(Checksum::NoChecksum),
            2 => Ok(Checksum::Sha1(Bytes::decode(m)?)),
            3 => Ok(Checksum::Crc32c(u32::decode(m)?)),
            tag => Err(WireError::UnknownTag {
                kind: "checksum",
                tag,
            }),
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checksum::NoChecksum => write!(f, "none"),
            Checksum::Sha1(digest) => {
                write!(f, "sha1:")?;
                for b in digest.iter() {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Checksum::Crc32c(crc) => write!(f, "crc32c:{crc:08x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(c: &Checksum) -> Checksum {
        let mut mb = MessageBuilder::new();
        c.encode(&mut mb);
        let mut m = Message::new(mb.freeze());
        Checksum::decode(&mut m).unwrap()
    }

    #[test]
    fn test_roundtrip_all_variants() {
        for c in [
            Checksum::NoChecksum,
            Checksum::sha1_of(b"fragment payload"),
            Checksum::crc32c_of(b"fragment payload"),
        ] {
            assert_eq!(roundtrip(&c), c);
        }
    }

    #[test]
    fn test_verify() {
        let data = b"the chunk bytes";
        assert!(Checksum::NoChecksum.verify(data));
        assert!(Checksum::sha1_of(data).verify(data));
        assert!(!Checksum::sha1_of(data).verify(b"other bytes"));
        assert!(Checksum::crc32c_of(data).verify(data));
        assert!(!Checksum::crc32c_of(data).verify(b"other bytes"));
    }

    #[test]
    fn test_unknown_tag_fails() {
        let mut m = Message::new(Bytes::from_static(&[7]));
        assert!(matches!(
            Checksum::decode(&mut m).unwrap_err(),
            WireError::UnknownTag {
                kind: "checksum",
                tag: 7
            }
        ));
    }
}
