//! Object manifests and their versioned binary codec
//!
//! A manifest describes one stored object: how it was chunked, how each
//! chunk was erasure-coded, which transforms were applied, and where every
//! fragment lives. Manifests arrive over the wire inside proxy responses
//! and are decoded here; the encode side exists for servers and tests.
//!
//! Two format revisions are live:
//!
//! - **v1** wraps the whole record in one snappy-compressed block and lays
//!   the fragment data out as three parallel matrices (locations,
//!   checksums, packed sizes) that are zipped after decoding. The three
//!   matrices must agree in shape; stored data still uses this form, so it
//!   is reproduced bit-for-bit.
//! - **v2** prefixes the compressed block with an explicit byte length
//!   (the parent can skip the record even when the body fails to parse)
//!   and encodes fragments as self-describing nested records, which
//!   tolerate per-fragment format drift: the streaming counter and
//!   fragment-number fields appended by later revisions are probed by
//!   "bytes remain in this record", not required.

use crate::checksum::Checksum;
use crate::compression::Compression;
use crate::encryption::EncryptInfo;
use crate::error::{ContinuableError, DecodeError, Result};
use crate::ids::{NamespaceId, OsdId};
use bytes::Bytes;
use reefstore_wire::{Message, MessageBuilder, Varint, WireDecode, WireEncode, WireError};
use tracing::debug;

/// Erasure-coding parameters of one object.
///
/// `k` fragments suffice to reconstruct a chunk, `m` more carry the
/// redundancy, `w` is the word size of the code. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingScheme {
    pub k: u32,
    pub m: u32,
    pub w: u8,
}

impl EncodingScheme {
    pub fn fragments_per_chunk(&self) -> usize {
        (self.k + self.m) as usize
    }
}

impl WireEncode for EncodingScheme {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_type_tag(1);
        self.k.encode(mb);
        self.m.encode(mb);
        self.w.encode(mb);
    }
}

impl WireDecode for EncodingScheme {
    fn decode(m: &mut Message) -> reefstore_wire::Result<Self> {
        let version = u8::decode(m)?;
        if version != 1 {
            return Err(WireError::UnexpectedVersion {
                kind: "encoding scheme",
                found: version,
            });
        }
        Ok(EncodingScheme {
            k: u32::decode(m)?,
            m: u32::decode(m)?,
            w: u8::decode(m)?,
        })
    }
}

/// Where one fragment lives: the OSD holding it (`None` while a fragment
/// is unplaced) and the fragment's version counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentLocation {
    pub osd: Option<OsdId>,
    pub version: u32,
}

impl WireEncode for FragmentLocation {
    fn encode(&self, mb: &mut MessageBuilder) {
        self.osd.encode(mb);
        self.version.encode(mb);
    }
}

impl WireDecode for FragmentLocation {
    fn decode(m: &mut Message) -> reefstore_wire::Result<Self> {
        Ok(FragmentLocation {
            osd: Option::<OsdId>::decode(m)?,
            version: u32::decode(m)?,
        })
    }
}

fn small_bytes_encode(bytes: &Bytes, mb: &mut MessageBuilder) {
    Varint(bytes.len() as u64).encode(mb);
    mb.add_raw(bytes);
}

fn small_bytes_decode(m: &mut Message) -> reefstore_wire::Result<Bytes> {
    let len = Varint::decode(m)?.0 as usize;
    m.take(len)
}

/// One erasure-coded piece of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub location: FragmentLocation,
    pub checksum: Checksum,
    pub packed_length: u32,
    /// Counter for counter-mode partial decryption. Absent in records
    /// written before the field existed.
    pub ctr: Option<Bytes>,
    /// Fragment-number tag. Absent in records written before the field
    /// existed.
    pub fnr: Option<Bytes>,
}

/// The v2 self-describing fragment record: a varint byte length, then a
/// bounded sub-record the parent skips as a unit.
impl WireEncode for Fragment {
    fn encode(&self, mb: &mut MessageBuilder) {
        let mut inner = MessageBuilder::new();
        inner.add_type_tag(1);
        self.location.encode(&mut inner);
        self.checksum.encode(&mut inner);
        self.packed_length.encode(&mut inner);
        match &self.ctr {
            Some(ctr) => {
                true.encode(&mut inner);
                small_bytes_encode(ctr, &mut inner);
            }
            None => false.encode(&mut inner),
        }
        match &self.fnr {
            Some(fnr) => {
                true.encode(&mut inner);
                small_bytes_encode(fnr, &mut inner);
            }
            None => false.encode(&mut inner),
        }
        let body = inner.freeze();
        Varint(body.len() as u64).encode(mb);
        mb.add_raw(&body);
    }
}

impl WireDecode for Fragment {
    fn decode(m: &mut Message) -> reefstore_wire::Result<Self> {
        let len = Varint::decode(m)?.0 as usize;
        let mut inner = m.take_nested(len)?;

        let version = u8::decode(&mut inner)?;
        if version != 1 {
            return Err(WireError::UnexpectedVersion {
                kind: "fragment",
                found: version,
            });
        }
        let location = FragmentLocation::decode(&mut inner)?;
        let checksum = Checksum::decode(&mut inner)?;
        let packed_length = u32::decode(&mut inner)?;

        // trailing optional fields: running out of record is the normal
        // terminal state, not an error
        let mut ctr = None;
        if !inner.is_empty() && bool::decode(&mut inner)? {
            ctr = Some(small_bytes_decode(&mut inner)?);
        }
        let mut fnr = None;
        if !inner.is_empty() && bool::decode(&mut inner)? {
            fnr = Some(small_bytes_decode(&mut inner)?);
        }

        Ok(Fragment {
            location,
            checksum,
            packed_length,
            ctr,
            fnr,
        })
    }
}

/// Versioned descriptor of one stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub object_id: Bytes,
    pub chunk_sizes: Vec<u32>,
    pub encoding_scheme: EncodingScheme,
    pub compression: Compression,
    pub encrypt_info: EncryptInfo,
    /// Whole-object checksum.
    pub checksum: Checksum,
    pub size: u64,
    /// `fragments[chunk][fragment]`; row count equals `chunk_sizes.len()`,
    /// row width equals `k + m`.
    pub fragments: Vec<Vec<Fragment>>,
    pub version_id: u32,
    pub max_disks_per_node: u32,
    pub timestamp: f64,
}

fn decompress(compressed: &[u8]) -> Result<Bytes> {
    snap::raw::Decoder::new()
        .decompress_vec(compressed)
        .map(Bytes::from)
        .map_err(|e| DecodeError::Snappy(e.to_string()))
}

fn compress(raw: &[u8]) -> Result<Bytes> {
    snap::raw::Encoder::new()
        .compress_vec(raw)
        .map(Bytes::from)
        .map_err(|e| DecodeError::Snappy(e.to_string()))
}

fn check_layout_tag(m: &mut Message) -> Result<()> {
    let tag = u8::decode(m)?;
    if tag != 1 {
        return Err(WireError::UnexpectedVersion {
            kind: "fragment layout",
            found: tag,
        }
        .into());
    }
    Ok(())
}

fn decode_layout<T: WireDecode>(m: &mut Message) -> Result<Vec<Vec<T>>> {
    check_layout_tag(m)?;
    Ok(Vec::<Vec<T>>::decode(m)?)
}

fn encode_layout<T: WireEncode>(matrix: &Vec<Vec<T>>, mb: &mut MessageBuilder) {
    mb.add_type_tag(1);
    matrix.encode(mb);
}

/// The leading fields shared by both body versions.
struct BodyHeader {
    name: String,
    object_id: Bytes,
    chunk_sizes: Vec<u32>,
    encoding_scheme: EncodingScheme,
    compression: Compression,
    encrypt_info: EncryptInfo,
    checksum: Checksum,
    size: u64,
}

impl BodyHeader {
    fn decode(m: &mut Message) -> Result<Self> {
        let name = String::decode(m)?;
        let object_id = Bytes::decode(m)?;
        let chunk_sizes = Vec::<u32>::decode(m)?;
        let inner_version = u8::decode(m)?;
        if inner_version != 1 {
            return Err(WireError::UnexpectedVersion {
                kind: "manifest body",
                found: inner_version,
            }
            .into());
        }
        Ok(BodyHeader {
            name,
            object_id,
            chunk_sizes,
            encoding_scheme: EncodingScheme::decode(m)?,
            compression: Compression::decode(m)?,
            encrypt_info: EncryptInfo::decode(m)?,
            checksum: Checksum::decode(m)?,
            size: u64::decode(m)?,
        })
    }

    fn encode(manifest: &Manifest, mb: &mut MessageBuilder) {
        manifest.name.encode(mb);
        manifest.object_id.encode(mb);
        manifest.chunk_sizes.encode(mb);
        mb.add_type_tag(1);
        manifest.encoding_scheme.encode(mb);
        manifest.compression.encode(mb);
        manifest.encrypt_info.encode(mb);
        manifest.checksum.encode(mb);
        manifest.size.encode(mb);
    }
}

impl Manifest {
    pub fn chunk_count(&self) -> usize {
        self.chunk_sizes.len()
    }

    /// Decode a manifest at the cursor. Consumes exactly the version byte
    /// when the version is unrecognized, and the whole record otherwise.
    pub fn decode(m: &mut Message) -> Result<Self> {
        let mut body_consumed = false;
        Self::decode_versioned(m, &mut body_consumed)
    }

    /// As [`Manifest::decode`], reporting through `body_consumed` whether
    /// the parent cursor has been advanced past the versioned body (at
    /// which point any trailing suffix sits at a known offset even if the
    /// body itself fails to parse).
    pub(crate) fn decode_versioned(m: &mut Message, body_consumed: &mut bool) -> Result<Self> {
        *body_consumed = false;
        let version = u8::decode(m)?;
        match version {
            1 => Self::decode_v1(m, body_consumed),
            2 => Self::decode_v2(m, body_consumed),
            found => Err(WireError::UnexpectedVersion {
                kind: "manifest",
                found,
            }
            .into()),
        }
    }

    fn decode_v1(m: &mut Message, body_consumed: &mut bool) -> Result<Self> {
        debug!("decoding manifest body, format v1");
        let compressed = Bytes::decode(m)?;
        *body_consumed = true;

        let body = decompress(&compressed)?;
        let mut m2 = Message::new(body);
        let header = BodyHeader::decode(&mut m2)?;

        let locations = decode_layout::<FragmentLocation>(&mut m2)?;
        let checksums = decode_layout::<Checksum>(&mut m2)?;
        let packed_sizes = decode_layout::<u32>(&mut m2)?;

        // three parallel matrices; the zip is only defined when the shapes
        // agree
        if checksums.len() != locations.len() || packed_sizes.len() != locations.len() {
            return Err(DecodeError::LayoutShapeMismatch);
        }
        let mut fragments = Vec::with_capacity(locations.len());
        for ((row_loc, row_crc), row_len) in locations
            .into_iter()
            .zip(checksums.into_iter())
            .zip(packed_sizes.into_iter())
        {
            if row_crc.len() != row_loc.len() || row_len.len() != row_loc.len() {
                return Err(DecodeError::LayoutShapeMismatch);
            }
            let row = row_loc
                .into_iter()
                .zip(row_crc)
                .zip(row_len)
                .map(|((location, checksum), packed_length)| Fragment {
                    location,
                    checksum,
                    packed_length,
                    ctr: None,
                    fnr: None,
                })
                .collect();
            fragments.push(row);
        }

        let manifest = Manifest {
            name: header.name,
            object_id: header.object_id,
            chunk_sizes: header.chunk_sizes,
            encoding_scheme: header.encoding_scheme,
            compression: header.compression,
            encrypt_info: header.encrypt_info,
            checksum: header.checksum,
            size: header.size,
            fragments,
            version_id: u32::decode(&mut m2)?,
            max_disks_per_node: u32::decode(&mut m2)?,
            timestamp: f64::decode(&mut m2)?,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    fn decode_v2(m: &mut Message, body_consumed: &mut bool) -> Result<Self> {
        debug!("decoding manifest body, format v2");
        let body_len = u32::decode(m)? as usize;
        let mut wrapped = m.take_nested(body_len)?;
        *body_consumed = true;

        let compressed = wrapped.take(body_len)?;
        let body = decompress(&compressed)?;
        let mut m2 = Message::new(body);
        let header = BodyHeader::decode(&mut m2)?;

        check_layout_tag(&mut m2)?;
        let fragments = Vec::<Vec<Fragment>>::decode(&mut m2)?;

        // trailing fields appended after the fragment matrix; absent in
        // bodies written by older peers
        let version_id = if m2.is_empty() { 0 } else { u32::decode(&mut m2)? };
        let max_disks_per_node = if m2.is_empty() { 0 } else { u32::decode(&mut m2)? };
        let timestamp = if m2.is_empty() { 0.0 } else { f64::decode(&mut m2)? };

        let manifest = Manifest {
            name: header.name,
            object_id: header.object_id,
            chunk_sizes: header.chunk_sizes,
            encoding_scheme: header.encoding_scheme,
            compression: header.compression,
            encrypt_info: header.encrypt_info,
            checksum: header.checksum,
            size: header.size,
            fragments,
            version_id,
            max_disks_per_node,
            timestamp,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.fragments.len() != self.chunk_sizes.len() {
            return Err(DecodeError::ChunkCountMismatch {
                fragments: self.fragments.len(),
                chunks: self.chunk_sizes.len(),
            });
        }
        let width = self.encoding_scheme.fragments_per_chunk();
        if self.fragments.iter().any(|row| row.len() != width) {
            return Err(DecodeError::LayoutShapeMismatch);
        }
        Ok(())
    }

    /// Encode in the v1 layout (whole-record compression, three parallel
    /// layout matrices). Fragments' `ctr`/`fnr` cannot travel in this
    /// layout and are dropped.
    pub fn encode_v1(&self, mb: &mut MessageBuilder) -> Result<()> {
        let mut body = MessageBuilder::new();
        BodyHeader::encode(self, &mut body);

        let locations: Vec<Vec<FragmentLocation>> = self
            .fragments
            .iter()
            .map(|row| row.iter().map(|f| f.location).collect())
            .collect();
        let checksums: Vec<Vec<Checksum>> = self
            .fragments
            .iter()
            .map(|row| row.iter().map(|f| f.checksum.clone()).collect())
            .collect();
        let packed_sizes: Vec<Vec<u32>> = self
            .fragments
            .iter()
            .map(|row| row.iter().map(|f| f.packed_length).collect())
            .collect();
        encode_layout(&locations, &mut body);
        encode_layout(&checksums, &mut body);
        encode_layout(&packed_sizes, &mut body);

        self.version_id.encode(&mut body);
        self.max_disks_per_node.encode(&mut body);
        self.timestamp.encode(&mut body);

        let compressed = compress(&body.freeze())?;
        mb.add_type_tag(1);
        compressed.encode(mb);
        Ok(())
    }

    /// Encode in the v2 layout (explicit body length, self-describing
    /// fragment records).
    pub fn encode_v2(&self, mb: &mut MessageBuilder) -> Result<()> {
        let mut body = MessageBuilder::new();
        BodyHeader::encode(self, &mut body);
        body.add_type_tag(1);
        self.fragments.encode(&mut body);
        self.version_id.encode(&mut body);
        self.max_disks_per_node.encode(&mut body);
        self.timestamp.encode(&mut body);

        let compressed = compress(&body.freeze())?;
        mb.add_type_tag(2);
        (compressed.len() as u32).encode(mb);
        mb.add_raw(&compressed);
        Ok(())
    }
}

/// A manifest with its namespace identity appended after the versioned
/// body on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestWithNamespaceId {
    pub manifest: Manifest,
    pub namespace_id: NamespaceId,
}

impl ManifestWithNamespaceId {
    /// Decode a manifest-plus-namespace-id record.
    ///
    /// On a body decode failure the namespace id is still recovered when
    /// the cursor had already advanced past the body, so batch callers can
    /// skip this record and keep reading the next one. See
    /// [`ContinuableError`].
    pub fn decode(m: &mut Message) -> std::result::Result<Self, ContinuableError> {
        let mut body_consumed = false;
        match Manifest::decode_versioned(m, &mut body_consumed) {
            Ok(manifest) => {
                let namespace_id = NamespaceId::decode(m).map_err(|e| ContinuableError {
                    error: e.into(),
                    namespace_id: None,
                })?;
                Ok(ManifestWithNamespaceId {
                    manifest,
                    namespace_id,
                })
            }
            Err(error) => {
                let namespace_id = if body_consumed {
                    NamespaceId::decode(m).ok()
                } else {
                    None
                };
                Err(ContinuableError {
                    error,
                    namespace_id,
                })
            }
        }
    }

    /// Decode without the continuation contract; any failure is terminal.
    pub fn decode_strict(m: &mut Message) -> Result<Self> {
        Self::decode(m).map_err(|e| e.error)
    }

    pub fn encode_v1(&self, mb: &mut MessageBuilder) -> Result<()> {
        self.manifest.encode_v1(mb)?;
        self.namespace_id.encode(mb);
        Ok(())
    }

    pub fn encode_v2(&self, mb: &mut MessageBuilder) -> Result<()> {
        self.manifest.encode_v2(mb)?;
        self.namespace_id.encode(mb);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{Algorithm, ChainingMode, Encrypted, KeyLength};

    fn sample_fragment(osd: u64, data: &[u8]) -> Fragment {
        Fragment {
            location: FragmentLocation {
                osd: Some(OsdId(osd)),
                version: 0,
            },
            checksum: Checksum::crc32c_of(data),
            packed_length: data.len() as u32,
            ctr: None,
            fnr: None,
        }
    }

    fn sample_manifest() -> Manifest {
        let scheme = EncodingScheme { k: 2, m: 1, w: 8 };
        let fragments = (0..2u64)
            .map(|chunk| {
                (0..3u64)
                    .map(|f| sample_fragment(chunk * 3 + f, b"fragment bytes"))
                    .collect()
            })
            .collect();
        Manifest {
            name: "photos/2024/reef.jpg".to_string(),
            object_id: Bytes::from_static(b"\x01\x02obj\xff"),
            chunk_sizes: vec![4096, 1024],
            encoding_scheme: scheme,
            compression: Compression::Snappy,
            encrypt_info: EncryptInfo::NoEncryption,
            checksum: Checksum::sha1_of(b"whole object"),
            size: 5120,
            fragments,
            version_id: 7,
            max_disks_per_node: 3,
            timestamp: 1_722_000_000.25,
        }
    }

    fn encode_v1_bytes(manifest: &Manifest) -> Bytes {
        let mut mb = MessageBuilder::new();
        manifest.encode_v1(&mut mb).unwrap();
        mb.freeze()
    }

    fn encode_v2_bytes(manifest: &Manifest) -> Bytes {
        let mut mb = MessageBuilder::new();
        manifest.encode_v2(&mut mb).unwrap();
        mb.freeze()
    }

    #[test]
    fn test_v1_roundtrip() {
        let manifest = sample_manifest();
        let mut m = Message::new(encode_v1_bytes(&manifest));
        let decoded = Manifest::decode(&mut m).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(m.remaining(), 0);
    }

    #[test]
    fn test_v2_roundtrip_with_optional_fields() {
        let mut manifest = sample_manifest();
        manifest.encrypt_info = EncryptInfo::Encrypted(Encrypted {
            algorithm: Algorithm::Aes,
            chaining_mode: ChainingMode::Ctr,
            key_length: KeyLength::L256,
            key_identification: Bytes::from_static(b"key-id"),
        });
        manifest.fragments[0][1].ctr = Some(Bytes::from_static(b"\x00\x00\x00\x01"));
        manifest.fragments[1][2].fnr = Some(Bytes::from_static(b"fn-9"));

        let mut m = Message::new(encode_v2_bytes(&manifest));
        let decoded = Manifest::decode(&mut m).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(m.remaining(), 0);
    }

    #[test]
    fn test_v1_and_v2_decode_to_equal_manifests() {
        let manifest = sample_manifest();
        let mut m1 = Message::new(encode_v1_bytes(&manifest));
        let mut m2 = Message::new(encode_v2_bytes(&manifest));
        let from_v1 = Manifest::decode(&mut m1).unwrap();
        let from_v2 = Manifest::decode(&mut m2).unwrap();
        assert_eq!(from_v1, from_v2);
    }

    #[test]
    fn test_unknown_version_consumes_only_the_version_byte() {
        let mut m = Message::new(Bytes::from_static(&[3, 0xaa, 0xbb, 0xcc]));
        let err = Manifest::decode(&mut m).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Wire(WireError::UnexpectedVersion {
                kind: "manifest",
                found: 3
            })
        ));
        assert_eq!(m.position(), 1);
    }

    #[test]
    fn test_fragment_record_without_optional_fields() {
        // a record from before ctr/fnr existed: version, location,
        // checksum, packed length, nothing else
        let mut inner = MessageBuilder::new();
        inner.add_type_tag(1);
        FragmentLocation {
            osd: Some(OsdId(4)),
            version: 2,
        }
        .encode(&mut inner);
        Checksum::NoChecksum.encode(&mut inner);
        512u32.encode(&mut inner);
        let body = inner.freeze();

        let mut mb = MessageBuilder::new();
        Varint(body.len() as u64).encode(&mut mb);
        mb.add_raw(&body);

        let mut m = Message::new(mb.freeze());
        let fragment = Fragment::decode(&mut m).unwrap();
        assert_eq!(fragment.location.osd, Some(OsdId(4)));
        assert_eq!(fragment.packed_length, 512);
        assert_eq!(fragment.ctr, None);
        assert_eq!(fragment.fnr, None);
    }

    #[test]
    fn test_fragment_record_with_ctr_but_no_fnr() {
        let mut inner = MessageBuilder::new();
        inner.add_type_tag(1);
        FragmentLocation {
            osd: None,
            version: 0,
        }
        .encode(&mut inner);
        Checksum::NoChecksum.encode(&mut inner);
        128u32.encode(&mut inner);
        true.encode(&mut inner);
        small_bytes_encode(&Bytes::from_static(b"\x09"), &mut inner);
        let body = inner.freeze();

        let mut mb = MessageBuilder::new();
        Varint(body.len() as u64).encode(&mut mb);
        mb.add_raw(&body);

        let mut m = Message::new(mb.freeze());
        let fragment = Fragment::decode(&mut m).unwrap();
        assert_eq!(fragment.ctr, Some(Bytes::from_static(b"\x09")));
        assert_eq!(fragment.fnr, None);
    }

    #[test]
    fn test_v1_layout_shape_mismatch_is_rejected() {
        // hand-build a v1 body whose checksum matrix has fewer rows than
        // the location matrix
        let manifest = sample_manifest();
        let mut body = MessageBuilder::new();
        BodyHeader::encode(&manifest, &mut body);

        let locations: Vec<Vec<FragmentLocation>> = manifest
            .fragments
            .iter()
            .map(|row| row.iter().map(|f| f.location).collect())
            .collect();
        let checksums: Vec<Vec<Checksum>> = vec![vec![Checksum::NoChecksum; 3]];
        let packed_sizes: Vec<Vec<u32>> = manifest
            .fragments
            .iter()
            .map(|row| row.iter().map(|f| f.packed_length).collect())
            .collect();
        encode_layout(&locations, &mut body);
        encode_layout(&checksums, &mut body);
        encode_layout(&packed_sizes, &mut body);
        manifest.version_id.encode(&mut body);
        manifest.max_disks_per_node.encode(&mut body);
        manifest.timestamp.encode(&mut body);

        let compressed = compress(&body.freeze()).unwrap();
        let mut mb = MessageBuilder::new();
        mb.add_type_tag(1);
        compressed.encode(&mut mb);

        let mut m = Message::new(mb.freeze());
        assert!(matches!(
            Manifest::decode(&mut m).unwrap_err(),
            DecodeError::LayoutShapeMismatch
        ));
    }

    #[test]
    fn test_chunk_count_mismatch_is_rejected() {
        let mut manifest = sample_manifest();
        manifest.chunk_sizes.push(64); // three sizes, two fragment rows
        let mut m = Message::new(encode_v2_bytes(&manifest));
        assert!(matches!(
            Manifest::decode(&mut m).unwrap_err(),
            DecodeError::ChunkCountMismatch {
                fragments: 2,
                chunks: 3
            }
        ));
    }

    #[test]
    fn test_v2_body_without_trailing_fields() {
        // a body from a peer that predates version_id/max_disks/timestamp:
        // header, layout tag, fragments, nothing after
        let manifest = sample_manifest();
        let mut body = MessageBuilder::new();
        BodyHeader::encode(&manifest, &mut body);
        body.add_type_tag(1);
        manifest.fragments.encode(&mut body);
        let compressed = compress(&body.freeze()).unwrap();

        let mut mb = MessageBuilder::new();
        mb.add_type_tag(2);
        (compressed.len() as u32).encode(&mut mb);
        mb.add_raw(&compressed);

        let mut m = Message::new(mb.freeze());
        let decoded = Manifest::decode(&mut m).unwrap();
        assert_eq!(decoded.fragments, manifest.fragments);
        assert_eq!(decoded.version_id, 0);
        assert_eq!(decoded.max_disks_per_node, 0);
        assert_eq!(decoded.timestamp, 0.0);
    }

    fn encode_v2_with_bad_inner_version(manifest: &Manifest, namespace_id: NamespaceId) -> Bytes {
        let mut body = MessageBuilder::new();
        manifest.name.encode(&mut body);
        manifest.object_id.encode(&mut body);
        manifest.chunk_sizes.encode(&mut body);
        body.add_type_tag(9); // inner version a future peer might write
        let compressed = compress(&body.freeze()).unwrap();

        let mut mb = MessageBuilder::new();
        mb.add_type_tag(2);
        (compressed.len() as u32).encode(&mut mb);
        mb.add_raw(&compressed);
        namespace_id.encode(&mut mb);
        mb.freeze()
    }

    #[test]
    fn test_continuable_failure_recovers_namespace_id() {
        let manifest = sample_manifest();
        let bytes = encode_v2_with_bad_inner_version(&manifest, NamespaceId(42));
        let mut m = Message::new(bytes);
        let err = ManifestWithNamespaceId::decode(&mut m).unwrap_err();
        assert!(err.is_continuable());
        assert_eq!(err.namespace_id, Some(NamespaceId(42)));
        // the cursor sits after the whole record, ready for the next one
        assert_eq!(m.remaining(), 0);
    }

    #[test]
    fn test_truncated_record_is_not_continuable() {
        // v2 tag promising a body the buffer does not hold
        let mut mb = MessageBuilder::new();
        mb.add_type_tag(2);
        1000u32.encode(&mut mb);
        mb.add_raw(b"short");
        let mut m = Message::new(mb.freeze());
        let err = ManifestWithNamespaceId::decode(&mut m).unwrap_err();
        assert!(!err.is_continuable());
        assert_eq!(err.namespace_id, None);
    }

    #[test]
    fn test_manifest_with_namespace_id_roundtrip() {
        let record = ManifestWithNamespaceId {
            manifest: sample_manifest(),
            namespace_id: NamespaceId(9000),
        };
        for encode in [
            ManifestWithNamespaceId::encode_v1,
            ManifestWithNamespaceId::encode_v2,
        ] {
            let mut mb = MessageBuilder::new();
            encode(&record, &mut mb).unwrap();
            let mut m = Message::new(mb.freeze());
            let decoded = ManifestWithNamespaceId::decode(&mut m).unwrap();
            assert_eq!(decoded, record);
        }
    }
}
