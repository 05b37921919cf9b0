//! Atomic assert/update sequences
//!
//! An apply-sequence request carries a list of asserts that must all hold
//! and a list of updates applied atomically when they do. Both are closed
//! tagged unions; their numeric type tags are fixed by deployed peers.

use bytes::Bytes;
use reefstore_core::Checksum;
use reefstore_wire::{MessageBuilder, WireEncode};

/// Precondition checked by the proxy before applying the updates.
#[derive(Debug, Clone)]
pub enum Assert {
    ObjectExists { name: String },
    ObjectDoesNotExist { name: String },
    ObjectHasId { name: String, object_id: Bytes },
    ObjectHasChecksum { name: String, checksum: Checksum },
}

impl WireEncode for Assert {
    fn encode(&self, mb: &mut MessageBuilder) {
        match self {
            Assert::ObjectExists { name } => {
                mb.add_type_tag(1);
                name.encode(mb);
            }
            Assert::ObjectDoesNotExist { name } => {
                mb.add_type_tag(2);
                name.encode(mb);
            }
            Assert::ObjectHasId { name, object_id } => {
                mb.add_type_tag(3);
                name.encode(mb);
                object_id.encode(mb);
            }
            Assert::ObjectHasChecksum { name, checksum } => {
                mb.add_type_tag(4);
                name.encode(mb);
                checksum.encode(mb);
            }
        }
    }
}

/// Mutation applied by the proxy once every assert held.
#[derive(Debug, Clone)]
pub enum Update {
    UploadObjectFromFile {
        name: String,
        file_path: String,
        checksum: Option<Checksum>,
    },
    UploadObject {
        name: String,
        data: Bytes,
        checksum: Option<Checksum>,
    },
    DeleteObject {
        name: String,
    },
}

impl WireEncode for Update {
    fn encode(&self, mb: &mut MessageBuilder) {
        match self {
            Update::UploadObjectFromFile {
                name,
                file_path,
                checksum,
            } => {
                mb.add_type_tag(1);
                name.encode(mb);
                file_path.encode(mb);
                checksum.encode(mb);
            }
            Update::UploadObject {
                name,
                data,
                checksum,
            } => {
                mb.add_type_tag(2);
                name.encode(mb);
                data.encode(mb);
                checksum.encode(mb);
            }
            Update::DeleteObject { name } => {
                mb.add_type_tag(3);
                name.encode(mb);
            }
        }
    }
}

/// Builder for one atomic batch.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    pub asserts: Vec<Assert>,
    pub updates: Vec<Update>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert_exists(mut self, name: impl Into<String>) -> Self {
        self.asserts.push(Assert::ObjectExists { name: name.into() });
        self
    }

    pub fn assert_does_not_exist(mut self, name: impl Into<String>) -> Self {
        self.asserts
            .push(Assert::ObjectDoesNotExist { name: name.into() });
        self
    }

    pub fn assert_object_id(mut self, name: impl Into<String>, object_id: Bytes) -> Self {
        self.asserts.push(Assert::ObjectHasId {
            name: name.into(),
            object_id,
        });
        self
    }

    pub fn assert_checksum(mut self, name: impl Into<String>, checksum: Checksum) -> Self {
        self.asserts.push(Assert::ObjectHasChecksum {
            name: name.into(),
            checksum,
        });
        self
    }

    pub fn upload_from_file(
        mut self,
        name: impl Into<String>,
        file_path: impl Into<String>,
        checksum: Option<Checksum>,
    ) -> Self {
        self.updates.push(Update::UploadObjectFromFile {
            name: name.into(),
            file_path: file_path.into(),
            checksum,
        });
        self
    }

    pub fn upload(
        mut self,
        name: impl Into<String>,
        data: Bytes,
        checksum: Option<Checksum>,
    ) -> Self {
        self.updates.push(Update::UploadObject {
            name: name.into(),
            data,
            checksum,
        });
        self
    }

    pub fn delete(mut self, name: impl Into<String>) -> Self {
        self.updates.push(Update::DeleteObject { name: name.into() });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reefstore_wire::{Message, WireDecode};

    #[test]
    fn test_sequence_builder_accumulates() {
        let seq = Sequence::new()
            .assert_does_not_exist("obj")
            .upload("obj", Bytes::from_static(b"payload"), None)
            .delete("stale-obj");
        assert_eq!(seq.asserts.len(), 1);
        assert_eq!(seq.updates.len(), 2);
    }

    #[test]
    fn test_assert_wire_layout() {
        let mut mb = MessageBuilder::new();
        Assert::ObjectHasId {
            name: "obj".to_string(),
            object_id: Bytes::from_static(b"id"),
        }
        .encode(&mut mb);
        let mut m = Message::new(mb.freeze());
        assert_eq!(u8::decode(&mut m).unwrap(), 3);
        assert_eq!(String::decode(&mut m).unwrap(), "obj");
        assert_eq!(Bytes::decode(&mut m).unwrap(), Bytes::from_static(b"id"));
    }

    #[test]
    fn test_upload_wire_layout_embeds_data() {
        let mut mb = MessageBuilder::new();
        Update::UploadObject {
            name: "obj".to_string(),
            data: Bytes::from_static(b"abc"),
            checksum: None,
        }
        .encode(&mut mb);
        let mut m = Message::new(mb.freeze());
        assert_eq!(u8::decode(&mut m).unwrap(), 2);
        assert_eq!(String::decode(&mut m).unwrap(), "obj");
        assert_eq!(Bytes::decode(&mut m).unwrap(), Bytes::from_static(b"abc"));
        assert!(!bool::decode(&mut m).unwrap()); // absent checksum
        assert!(m.is_empty());
    }
}
