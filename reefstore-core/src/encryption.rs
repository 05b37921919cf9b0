//! Fragment encryption identifiers
//!
//! Like [`crate::compression`], this names the transform without
//! implementing it: cipher internals live behind an opaque collaborator.
//! What the data path needs to know is whether a fragment can be partially
//! decrypted in place (counter mode can, block chaining cannot) and which
//! key the collaborator should fetch.

use bytes::Bytes;
use reefstore_wire::{Message, MessageBuilder, Result, WireDecode, WireEncode, WireError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Aes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainingMode {
    Cbc,
    Ctr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLength {
    L256,
}

/// Parameters of an encrypted object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encrypted {
    pub algorithm: Algorithm,
    pub chaining_mode: ChainingMode,
    pub key_length: KeyLength,
    /// Identifies the key at the key collaborator (a key digest, not the
    /// key itself).
    pub key_identification: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptInfo {
    NoEncryption,
    Encrypted(Encrypted),
}

impl EncryptInfo {
    /// Whether a byte range of a fragment can be decrypted without the
    /// surrounding blocks.
    pub fn supports_partial_decrypt(&self) -> bool {
        match self {
            EncryptInfo::NoEncryption => true,
            EncryptInfo::Encrypted(e) => e.chaining_mode == ChainingMode::Ctr,
        }
    }
}

impl WireEncode for EncryptInfo {
    fn encode(&self, mb: &mut MessageBuilder) {
        match self {
            EncryptInfo::NoEncryption => mb.add_type_tag(1),
            EncryptInfo::Encrypted(e) => {
                mb.add_type_tag(2);
                mb.add_type_tag(match e.algorithm {
                    Algorithm::Aes => 1,
                });
                mb.add_type_tag(match e.chaining_mode {
                    ChainingMode::Cbc => 1,
                    ChainingMode::Ctr => 2,
                });
                mb.add_type_tag(match e.key_length {
                    KeyLength::L256 => 1,
                });
                e.key_identification.encode(mb);
            }
        }
    }
}

impl WireDecode for EncryptInfo {
    fn decode(m: &mut Message) -> Result<Self> {
        match u8::decode(m)? {
            1 => Ok(EncryptInfo::NoEncryption),
            2 => {
                let algorithm = match u8::decode(m)? {
                    1 => Algorithm::Aes,
                    tag => {
                        return Err(WireError::UnknownTag {
                            kind: "encryption algorithm",
                            tag,
                        })
                    }
                };
                let chaining_mode = match u8::decode(m)? {
                    1 => ChainingMode::Cbc,
                    2 => ChainingMode::Ctr,
                    tag => {
                        return Err(WireError::UnknownTag {
                            kind: "chaining mode",
                            tag,
                        })
                    }
                };
                let key_length = match u8::decode(m)? {
                    1 => KeyLength::L256,
                    tag => {
                        return Err(WireError::UnknownTag {
                            kind: "key length",
                            tag,
                        })
                    }
                };
                let key_identification = Bytes::decode(m)?;
                Ok(EncryptInfo::Encrypted(Encrypted {
                    algorithm,
                    chaining_mode,
                    key_length,
                    key_identification,
                }))
            }
            tag => Err(WireError::UnknownTag {
                kind: "encryption",
                tag,
            }),
        }
    }
}

impl fmt::Display for EncryptInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptInfo::NoEncryption => write!(f, "none"),
            EncryptInfo::Encrypted(e) => write!(
                f,
                "aes-{}",
                match e.chaining_mode {
                    ChainingMode::Cbc => "cbc",
                    ChainingMode::Ctr => "ctr",
                }
            ),
        }
    }
}
