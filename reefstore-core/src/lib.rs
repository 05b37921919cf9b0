//! Reefstore Core Model
//!
//! The entity graph of the object data path: manifests, fragments, encoding
//! schemes, checksum/compression/encryption identifiers and the OSD
//! topology types, together with their versioned binary codecs.
//!
//! The manifest decoder accepts two on-wire format revisions (see
//! [`manifest`]) and is deliberately tolerant of structural growth: nested
//! records skip unknown trailing fields, optional fragment fields may be
//! absent in records written by older peers. Algorithm identifiers
//! (compression, encryption, checksum) get no such tolerance: an
//! unrecognized tag is always a hard decode failure.

pub mod checksum;
pub mod compression;
pub mod encryption;
pub mod error;
pub mod ids;
pub mod manifest;
pub mod osd;

pub use checksum::Checksum;
pub use compression::Compression;
pub use encryption::{ChainingMode, EncryptInfo, Encrypted};
pub use error::{ContinuableError, DecodeError, Result};
pub use ids::{AlbaId, NamespaceId, OsdId};
pub use manifest::{
    EncodingScheme, Fragment, FragmentLocation, Manifest, ManifestWithNamespaceId,
};
pub use osd::{OsdCapabilities, OsdEntry, OsdInfo, OsdMap};
