//! Proxy request writers and response readers
//!
//! One writer/reader pair per operation, all working against the wire
//! codec. Response readers assume the leading status word has already been
//! checked by [`super::Status::decode`] callers — each reader here decodes
//! the status itself and fails fast on a nonzero code.

use super::sequences::Sequence;
use super::{tag, Status};
use crate::cache::ManifestEntry;
use crate::error::Result;
use bytes::Bytes;
use reefstore_core::osd::{decode_osd_maps, OsdMap};
use reefstore_core::{AlbaId, Checksum, ManifestWithNamespaceId, NamespaceId};
use reefstore_wire::{Message, MessageBuilder, WireDecode, WireEncode};
use std::sync::Arc;
use tracing::warn;

fn write_tag(mb: &mut MessageBuilder, tag: u32) {
    tag.encode(mb);
}

/// One byte range of one object, read through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceDescriptor {
    pub offset: u64,
    pub size: u32,
}

impl WireEncode for SliceDescriptor {
    fn encode(&self, mb: &mut MessageBuilder) {
        self.offset.encode(mb);
        self.size.encode(mb);
    }
}

/// A byte range to read into a caller-supplied buffer.
pub struct ProxySlice<'a> {
    pub offset: u64,
    pub target: &'a mut [u8],
}

/// All requested ranges of one object.
pub struct ObjectSlices<'a> {
    pub object_name: String,
    pub slices: Vec<ProxySlice<'a>>,
}

impl WireEncode for ObjectSlices<'_> {
    fn encode(&self, mb: &mut MessageBuilder) {
        self.object_name.encode(mb);
        let descriptors: Vec<SliceDescriptor> = self
            .slices
            .iter()
            .map(|s| SliceDescriptor {
                offset: s.offset,
                size: s.target.len() as u32,
            })
            .collect();
        descriptors.encode(mb);
    }
}

/// One entry of a manifest-bearing response's trailing object-info list.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,
    /// Reserved blob carried alongside the name; opaque to this client.
    pub reserved: Bytes,
    pub manifest: ManifestEntry,
}

/// Decode the trailing object-info list of a manifest-bearing response.
///
/// One malformed manifest record is logged and skipped when its namespace
/// id could still be recovered (the cursor is then correctly positioned
/// for the next record); otherwise the failure propagates.
pub fn read_object_infos(m: &mut Message) -> Result<Vec<ObjectInfo>> {
    let count = u32::decode(m)? as usize;
    let mut infos = Vec::with_capacity(count.min(m.remaining()));
    for _ in 0..count {
        let name = String::decode(m)?;
        let reserved = Bytes::decode(m)?;
        match ManifestWithNamespaceId::decode(m) {
            Ok(record) => infos.push(ObjectInfo {
                name,
                reserved,
                manifest: Arc::new(record),
            }),
            Err(e) if e.is_continuable() => {
                warn!(object = %name, error = %e, "skipping malformed manifest record");
            }
            Err(e) => return Err(e.into()),
        }
    }
    infos.reverse();
    Ok(infos)
}

// ===== OsdInfo2 =====

pub fn write_osd_info2_request(mb: &mut MessageBuilder) {
    write_tag(mb, tag::OSD_INFO2);
}

pub fn read_osd_info2_response(m: &mut Message) -> Result<Vec<(AlbaId, OsdMap)>> {
    Status::decode(m)?.into_result()?;
    Ok(decode_osd_maps(m)?)
}

// ===== ReadObjectsSlices2 =====

pub fn write_read_objects_slices2_request(
    mb: &mut MessageBuilder,
    namespace: &str,
    objects: &[ObjectSlices<'_>],
    consistent_read: bool,
) {
    write_tag(mb, tag::READ_OBJECTS_SLICES2);
    namespace.encode(mb);
    (objects.len() as u32).encode(mb);
    for object in objects.iter().rev() {
        object.encode(mb);
    }
    consistent_read.encode(mb);
}

pub fn read_read_objects_slices2_response(
    m: &mut Message,
    objects: &mut [ObjectSlices<'_>],
) -> Result<Vec<ObjectInfo>> {
    Status::decode(m)?.into_result()?;
    let _data_len = u32::decode(m)?;
    for object in objects.iter_mut() {
        for slice in object.slices.iter_mut() {
            let data = m.take(slice.target.len())?;
            slice.target.copy_from_slice(&data);
        }
    }
    read_object_infos(m)
}

// ===== WriteObjectFs2 =====

pub fn write_write_object_fs2_request(
    mb: &mut MessageBuilder,
    namespace: &str,
    object_name: &str,
    input_file: &str,
    allow_overwrite: bool,
    checksum: Option<&Checksum>,
) {
    write_tag(mb, tag::WRITE_OBJECT_FS2);
    namespace.encode(mb);
    object_name.encode(mb);
    input_file.encode(mb);
    allow_overwrite.encode(mb);
    checksum.cloned().encode(mb);
}

pub fn read_write_object_fs2_response(m: &mut Message) -> Result<ManifestWithNamespaceId> {
    Status::decode(m)?.into_result()?;
    Ok(ManifestWithNamespaceId::decode_strict(m)?)
}

// ===== ApplySequence =====

pub fn write_apply_sequence_request(
    mb: &mut MessageBuilder,
    namespace: &str,
    write_barrier: bool,
    sequence: &Sequence,
) {
    write_tag(mb, tag::APPLY_SEQUENCE);
    namespace.encode(mb);
    write_barrier.encode(mb);
    sequence.asserts.encode(mb);
    sequence.updates.encode(mb);
}

pub fn read_apply_sequence_response(m: &mut Message) -> Result<Vec<ObjectInfo>> {
    Status::decode(m)?.into_result()?;
    read_object_infos(m)
}

// ===== InvalidateCache =====

pub fn write_invalidate_cache_request(mb: &mut MessageBuilder, namespace: &str) {
    write_tag(mb, tag::INVALIDATE_CACHE);
    namespace.encode(mb);
}

pub fn read_invalidate_cache_response(m: &mut Message) -> Result<()> {
    Status::decode(m)?.into_result()
}

// ===== HasLocalFragmentCache =====

pub fn write_has_local_fragment_cache_request(mb: &mut MessageBuilder) {
    write_tag(mb, tag::HAS_LOCAL_FRAGMENT_CACHE);
}

pub fn read_has_local_fragment_cache_response(m: &mut Message) -> Result<bool> {
    Status::decode(m)?.into_result()?;
    Ok(bool::decode(m)?)
}

// ===== GetFragmentEncryptionKey =====

pub fn write_get_fragment_encryption_key_request(
    mb: &mut MessageBuilder,
    alba_id: &str,
    namespace_id: NamespaceId,
) {
    write_tag(mb, tag::GET_FRAGMENT_ENCRYPTION_KEY);
    alba_id.encode(mb);
    namespace_id.0.encode(mb);
}

pub fn read_get_fragment_encryption_key_response(m: &mut Message) -> Result<Option<Bytes>> {
    Status::decode(m)?.into_result()?;
    Ok(Option::<Bytes>::decode(m)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_opens_with_its_tag() {
        let mut mb = MessageBuilder::new();
        write_osd_info2_request(&mut mb);
        let mut m = Message::new(mb.freeze());
        assert_eq!(u32::decode(&mut m).unwrap(), tag::OSD_INFO2);
        assert!(m.is_empty());
    }

    #[test]
    fn test_object_slices_encode_as_descriptors() {
        let mut first = [0u8; 10];
        let mut second = [0u8; 4];
        let object = ObjectSlices {
            object_name: "obj".to_string(),
            slices: vec![
                ProxySlice {
                    offset: 0,
                    target: &mut first,
                },
                ProxySlice {
                    offset: 100,
                    target: &mut second,
                },
            ],
        };
        let mut mb = MessageBuilder::new();
        object.encode(&mut mb);
        let mut m = Message::new(mb.freeze());
        assert_eq!(String::decode(&mut m).unwrap(), "obj");
        assert_eq!(u32::decode(&mut m).unwrap(), 2);
        // reversed element order on the wire
        assert_eq!(u64::decode(&mut m).unwrap(), 100);
        assert_eq!(u32::decode(&mut m).unwrap(), 4);
        assert_eq!(u64::decode(&mut m).unwrap(), 0);
        assert_eq!(u32::decode(&mut m).unwrap(), 10);
    }
}
