//! Message buffers and builders
//!
//! A [`Message`] is an immutable, reference-counted byte region plus a
//! cursor. Carving a nested message is cheap (a sub-slice of the refcounted
//! buffer), so decoders hand out bounded sub-cursors freely.

use crate::error::{Result, WireError};
use bytes::{BufMut, Bytes, BytesMut};

/// Read cursor over an immutable byte region.
#[derive(Debug, Clone)]
pub struct Message {
    data: Bytes,
    pos: usize,
}

impl Message {
    /// Wrap a byte region in a fresh cursor positioned at the start.
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the limit.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Look at the next `n` bytes without advancing.
    pub fn peek(&self, n: usize) -> Result<&[u8]> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        Ok(&self.data[self.pos..self.pos + n])
    }

    /// Advance the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }

    /// Take the next `n` bytes as a shared slice and advance.
    pub fn take(&mut self, n: usize) -> Result<Bytes> {
        if self.remaining() < n {
            return Err(WireError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    /// Take a fixed-size array and advance.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.peek(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.pos += N;
        Ok(out)
    }

    /// Borrow a sub-cursor over the next `len` bytes without advancing.
    ///
    /// The sub-cursor cannot read past `len`; whatever it leaves unconsumed
    /// is invisible to it. Callers that also want the parent advanced should
    /// use [`Message::take_nested`].
    pub fn nested(&self, len: usize) -> Result<Message> {
        if self.remaining() < len {
            return Err(WireError::NestedOverrun {
                len,
                remaining: self.remaining(),
            });
        }
        Ok(Message::new(self.data.slice(self.pos..self.pos + len)))
    }

    /// Carve a bounded sub-cursor and unconditionally advance the parent by
    /// `len`, regardless of how much of the nested record its decoder will
    /// consume. Unknown trailing fields inside the record are thereby
    /// skipped, which is the wire format's forward-compatibility mechanism.
    pub fn take_nested(&mut self, len: usize) -> Result<Message> {
        let m = self.nested(len)?;
        self.pos += len;
        Ok(m)
    }
}

/// Append-only builder for one outgoing message.
#[derive(Debug, Default)]
pub struct MessageBuilder {
    buf: BytesMut,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append raw bytes verbatim.
    pub fn add_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Append a one-byte variant tag.
    pub fn add_type_tag(&mut self, tag: u8) {
        self.buf.put_u8(tag);
    }

    /// Big-endian u32, used for cluster-wide consistent key encoding.
    pub fn put_u32_be(&mut self, v: u32) {
        self.buf.put_slice(&v.to_be_bytes());
    }

    /// Big-endian u64, used for cluster-wide consistent key encoding.
    pub fn put_u64_be(&mut self, v: u64) {
        self.buf.put_slice(&v.to_be_bytes());
    }

    /// Finish and return the raw payload.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Finish as a wire frame: 4-byte payload length, then the payload.
    pub fn into_frame(self) -> Bytes {
        let mut framed = BytesMut::with_capacity(4 + self.buf.len());
        framed.put_slice(&(self.buf.len() as u32).to_ne_bytes());
        framed.put_slice(&self.buf);
        framed.freeze()
    }
}

impl Message {
    /// Big-endian u32 counterpart of [`MessageBuilder::put_u32_be`].
    pub fn get_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array::<4>()?))
    }

    /// Big-endian u64 counterpart of [`MessageBuilder::put_u64_be`].
    pub fn get_u64_be(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array::<8>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_and_position() {
        let mut m = Message::new(Bytes::from_static(b"abcdef"));
        assert_eq!(m.remaining(), 6);
        let head = m.take(2).unwrap();
        assert_eq!(&head[..], b"ab");
        assert_eq!(m.position(), 2);
        assert_eq!(m.remaining(), 4);
    }

    #[test]
    fn test_take_past_limit_fails() {
        let mut m = Message::new(Bytes::from_static(b"ab"));
        let err = m.take(3).unwrap_err();
        assert_eq!(
            err,
            WireError::Truncated {
                needed: 3,
                remaining: 2
            }
        );
        // a failed take leaves the cursor where it was
        assert_eq!(m.position(), 0);
    }

    #[test]
    fn test_nested_is_bounded() {
        let mut m = Message::new(Bytes::from_static(b"xxyyzz"));
        m.skip(2).unwrap();
        let mut inner = m.take_nested(2).unwrap();
        assert_eq!(&inner.take(2).unwrap()[..], b"yy");
        assert!(inner.take(1).is_err());
        // parent advanced past the whole nested record
        assert_eq!(&m.take(2).unwrap()[..], b"zz");
    }

    #[test]
    fn test_take_nested_skips_unconsumed_tail() {
        let mut m = Message::new(Bytes::from_static(b"abcdef"));
        let _inner = m.take_nested(4).unwrap();
        // inner never read a byte, parent still sits after the record
        assert_eq!(m.position(), 4);
    }

    #[test]
    fn test_frame_layout() {
        let mut mb = MessageBuilder::new();
        mb.add_raw(b"hello");
        let frame = mb.into_frame();
        assert_eq!(frame.len(), 9);
        assert_eq!(u32::from_ne_bytes(frame[0..4].try_into().unwrap()), 5);
        assert_eq!(&frame[4..], b"hello");
    }

    #[test]
    fn test_big_endian_roundtrip() {
        let mut mb = MessageBuilder::new();
        mb.put_u32_be(0xdead_beef);
        mb.put_u64_be(0x0102_0304_0506_0708);
        let bytes = mb.freeze();
        assert_eq!(bytes[0], 0xde);
        let mut m = Message::new(bytes);
        assert_eq!(m.get_u32_be().unwrap(), 0xdead_beef);
        assert_eq!(m.get_u64_be().unwrap(), 0x0102_0304_0506_0708);
    }
}
