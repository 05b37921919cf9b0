//! Reefstore Wire Codec
//!
//! Type-directed encode/decode of primitives, strings, optionals, ordered
//! sequences and nested sub-messages over a length-delimited byte buffer.
//! This is the lowest layer of the client data path: every proxy request,
//! every OSD exchange and every persisted object descriptor goes through
//! this codec.
//!
//! Two properties of the format are load-bearing for interoperability with
//! deployed peers and must not be "fixed":
//! - sequences are written count-first with the elements in reverse order,
//!   and decoded by filling a pre-sized container back-to-front;
//! - a nested sub-message advances the parent cursor by the declared byte
//!   length no matter how much of it the nested decoder consumed, which is
//!   how unknown trailing fields from future format revisions are skipped.

pub mod buffer;
pub mod codec;
pub mod error;

pub use buffer::{Message, MessageBuilder};
pub use codec::{Varint, WireDecode, WireEncode};
pub use error::{Result, WireError};
