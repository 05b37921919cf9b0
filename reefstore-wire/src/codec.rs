//! Wire encode/decode for primitive and composite values
//!
//! Fixed-width integers travel native-endian on the primary path; the
//! big-endian helpers on [`MessageBuilder`]/[`Message`] exist for the few
//! fields that need cluster-wide consistent key encoding, chosen per field
//! by the caller.

use crate::buffer::{Message, MessageBuilder};
use crate::error::{Result, WireError};
use bytes::Bytes;

/// Append a value's wire form to a builder.
pub trait WireEncode {
    fn encode(&self, mb: &mut MessageBuilder);
}

/// Decode a value from a cursor, advancing it past the consumed bytes.
pub trait WireDecode: Sized {
    fn decode(m: &mut Message) -> Result<Self>;
}

impl WireEncode for bool {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_raw(&[u8::from(*self)]);
    }
}

impl WireDecode for bool {
    fn decode(m: &mut Message) -> Result<Self> {
        match m.take_array::<1>()?[0] {
            0x01 => Ok(true),
            0x00 => Ok(false),
            other => Err(WireError::InvalidBool(other)),
        }
    }
}

impl WireEncode for u8 {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_raw(&[*self]);
    }
}

impl WireDecode for u8 {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(m.take_array::<1>()?[0])
    }
}

impl WireEncode for u32 {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_raw(&self.to_ne_bytes());
    }
}

impl WireDecode for u32 {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(u32::from_ne_bytes(m.take_array::<4>()?))
    }
}

impl WireEncode for i32 {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_raw(&self.to_ne_bytes());
    }
}

impl WireDecode for i32 {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(i32::from_ne_bytes(m.take_array::<4>()?))
    }
}

impl WireEncode for u64 {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_raw(&self.to_ne_bytes());
    }
}

impl WireDecode for u64 {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(u64::from_ne_bytes(m.take_array::<8>()?))
    }
}

impl WireEncode for f64 {
    fn encode(&self, mb: &mut MessageBuilder) {
        mb.add_raw(&self.to_ne_bytes());
    }
}

impl WireDecode for f64 {
    fn decode(m: &mut Message) -> Result<Self> {
        Ok(f64::from_ne_bytes(m.take_array::<8>()?))
    }
}

/// Raw byte strings: 4-byte count plus the bytes, no terminator.
impl WireEncode for Bytes {
    fn encode(&self, mb: &mut MessageBuilder) {
        (self.len() as u32).encode(mb);
        mb.add_raw(self);
    }
}

impl WireDecode for Bytes {
    fn decode(m: &mut Message) -> Result<Self> {
        let len = u32::decode(m)? as usize;
        m.take(len)
    }
}

impl WireEncode for str {
    fn encode(&self, mb: &mut MessageBuilder) {
        (self.len() as u32).encode(mb);
        mb.add_raw(self.as_bytes());
    }
}

impl WireEncode for String {
    fn encode(&self, mb: &mut MessageBuilder) {
        self.as_str().encode(mb);
    }
}

/// Textual fields additionally validate UTF-8; opaque fields should decode
/// as [`Bytes`] instead.
impl WireDecode for String {
    fn decode(m: &mut Message) -> Result<Self> {
        let raw = Bytes::decode(m)?;
        String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

/// Optionals: presence byte, then the value.
impl<T: WireEncode> WireEncode for Option<T> {
    fn encode(&self, mb: &mut MessageBuilder) {
        match self {
            Some(v) => {
                true.encode(mb);
                v.encode(mb);
            }
            None => false.encode(mb),
        }
    }
}

impl<T: WireDecode> WireDecode for Option<T> {
    fn decode(m: &mut Message) -> Result<Self> {
        if bool::decode(m)? {
            Ok(Some(T::decode(m)?))
        } else {
            Ok(None)
        }
    }
}

impl<A: WireEncode, B: WireEncode> WireEncode for (A, B) {
    fn encode(&self, mb: &mut MessageBuilder) {
        self.0.encode(mb);
        self.1.encode(mb);
    }
}

impl<A: WireDecode, B: WireDecode> WireDecode for (A, B) {
    fn decode(m: &mut Message) -> Result<Self> {
        let a = A::decode(m)?;
        let b = B::decode(m)?;
        Ok((a, b))
    }
}

/// Ordered sequences: 4-byte count, then the elements in REVERSE order.
///
/// The decoder allocates the full-size container first and fills positions
/// back-to-front, so the reversal cancels out at the value level. Peers
/// depend on this byte order; it is not negotiable.
impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, mb: &mut MessageBuilder) {
        (self.len() as u32).encode(mb);
        for item in self.iter().rev() {
            item.encode(mb);
        }
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(m: &mut Message) -> Result<Self> {
        let count = u32::decode(m)? as usize;
        // capacity hint bounded by the remaining bytes; the count is
        // untrusted input
        let mut out = Vec::with_capacity(count.min(m.remaining()));
        for _ in 0..count {
            out.push(T::decode(m)?);
        }
        out.reverse();
        Ok(out)
    }
}

/// Base-128 variable-length integer: little-endian group order, 0x80
/// continuation bit. Used for compact small-integer fields such as short
/// string lengths inside nested manifest sub-records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varint(pub u64);

impl WireEncode for Varint {
    fn encode(&self, mb: &mut MessageBuilder) {
        let mut j = self.0;
        while j >= 0x80 {
            mb.add_raw(&[(j as u8 & 0x7f) | 0x80]);
            j >>= 7;
        }
        mb.add_raw(&[j as u8]);
    }
}

impl WireDecode for Varint {
    fn decode(m: &mut Message) -> Result<Self> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = u8::decode(m)?;
            if shift >= 64 {
                return Err(WireError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte < 0x80 {
                return Ok(Varint(value));
            }
            shift += 7;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip<T: WireEncode + WireDecode + PartialEq + std::fmt::Debug>(value: T) {
        let mut mb = MessageBuilder::new();
        value.encode(&mut mb);
        let mut m = Message::new(mb.freeze());
        assert_eq!(T::decode(&mut m).unwrap(), value);
        assert_eq!(m.remaining(), 0);
    }

    #[test]
    fn test_primitive_roundtrips() {
        roundtrip(true);
        roundtrip(false);
        roundtrip(0u8);
        roundtrip(0xa5u8);
        roundtrip(0u32);
        roundtrip(u32::MAX);
        roundtrip(-17i32);
        roundtrip(u64::MAX);
        roundtrip(3.25f64);
        roundtrip(String::from("object/with/slashes"));
        roundtrip(Bytes::from_static(b"\x00\xff raw"));
        roundtrip(Option::<u32>::None);
        roundtrip(Some(42u32));
        roundtrip(vec![String::from("a"), String::from("bb")]);
        roundtrip((String::from("last"), true));
    }

    #[test]
    fn test_bool_rejects_other_bytes() {
        let mut m = Message::new(Bytes::from_static(&[0x02]));
        assert_eq!(bool::decode(&mut m).unwrap_err(), WireError::InvalidBool(0x02));
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let mut mb = MessageBuilder::new();
        Bytes::from_static(&[0xff, 0xfe]).encode(&mut mb);
        let mut m = Message::new(mb.freeze());
        assert_eq!(String::decode(&mut m).unwrap_err(), WireError::InvalidUtf8);
    }

    #[test]
    fn test_sequence_is_reversed_on_the_wire() {
        let mut mb = MessageBuilder::new();
        vec![10u32, 20u32, 30u32].encode(&mut mb);
        let bytes = mb.freeze();
        let mut m = Message::new(bytes);
        assert_eq!(u32::decode(&mut m).unwrap(), 3);
        // first encoded element is the LAST value
        assert_eq!(u32::decode(&mut m).unwrap(), 30);
        assert_eq!(u32::decode(&mut m).unwrap(), 20);
        assert_eq!(u32::decode(&mut m).unwrap(), 10);
    }

    #[test]
    fn test_empty_sequence() {
        roundtrip(Vec::<u32>::new());
    }

    #[test]
    fn test_varint_boundaries() {
        for v in [0u64, 127, 128, 16383, 16384, u64::MAX] {
            roundtrip(Varint(v));
        }
        // wire sizes at the group boundaries
        let sizes = [(0u64, 1), (127, 1), (128, 2), (16383, 2), (16384, 3)];
        for (v, expected) in sizes {
            let mut mb = MessageBuilder::new();
            Varint(v).encode(&mut mb);
            assert_eq!(mb.len(), expected, "varint size of {v}");
        }
    }

    #[test]
    fn test_varint_truncated() {
        // continuation bit set but no next byte
        let mut m = Message::new(Bytes::from_static(&[0x80]));
        assert!(matches!(
            Varint::decode(&mut m).unwrap_err(),
            WireError::Truncated { .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_u32_roundtrip(v in any::<u32>()) {
            roundtrip(v);
        }

        #[test]
        fn prop_u64_roundtrip(v in any::<u64>()) {
            roundtrip(v);
        }

        #[test]
        fn prop_varint_roundtrip(v in any::<u64>()) {
            roundtrip(Varint(v));
        }

        #[test]
        fn prop_string_roundtrip(s in ".*") {
            roundtrip(s);
        }

        #[test]
        fn prop_sequence_roundtrip(v in proptest::collection::vec(any::<u64>(), 0..32)) {
            roundtrip(v);
        }

        #[test]
        fn prop_optional_roundtrip(v in proptest::option::of(any::<u32>())) {
            roundtrip(v);
        }
    }
}
