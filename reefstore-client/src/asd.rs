//! Direct OSD protocol client
//!
//! Speaks the storage daemon's native request/response protocol over an
//! injected transport: a once-per-connection prologue, then length-framed
//! exchanges. The only data-path command is the batched partial read;
//! `get_version` doubles as a liveness probe.

use crate::error::{ClientError, Result};
use crate::transport::{read_frame, BoxedTransport, KeyedRead};
use reefstore_wire::{Message, MessageBuilder, WireDecode, WireEncode};
use std::time::Duration;
use tracing::debug;

pub const ASD_MAGIC: &[u8; 4] = b"aLbA";
pub const ASD_VERSION: u32 = 1;

pub mod command {
    pub const GET_VERSION: u32 = 7;
    pub const PARTIAL_GET: u32 = 11;
}

/// Protocol return codes reported by the daemon.
pub mod return_code {
    pub const OK: u32 = 0;
    pub const UNKNOWN: u32 = 1;
    pub const ASSERT_FAILED: u32 = 2;
    pub const UNKNOWN_OPERATION: u32 = 4;
    pub const FULL: u32 = 6;
    pub const PROTOCOL_VERSION_MISMATCH: u32 = 7;
}

/// One pooled protocol connection to an OSD.
pub struct AsdClient {
    transport: BoxedTransport,
    timeout: Duration,
}

impl std::fmt::Debug for AsdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsdClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AsdClient {
    /// Send the prologue (magic, protocol version, optional daemon long
    /// id) over a freshly dialed transport.
    pub async fn handshake(
        mut transport: BoxedTransport,
        long_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut mb = MessageBuilder::new();
        mb.add_raw(ASD_MAGIC);
        ASD_VERSION.encode(&mut mb);
        long_id.map(str::to_string).encode(&mut mb);
        let prologue = mb.freeze();

        match tokio::time::timeout(timeout, transport.write_exact(&prologue)).await {
            Ok(Ok(())) => Ok(Self { transport, timeout }),
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    async fn exchange(&mut self, payload: MessageBuilder) -> Result<Message> {
        let frame = payload.into_frame();
        let round_trip = async {
            self.transport.write_exact(&frame).await?;
            read_frame(self.transport.as_mut()).await
        };
        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(Ok(m)) => Ok(m),
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        }
    }

    /// Fetch the requested byte ranges of one stored fragment into the
    /// caller's buffers. Returns whether the key exists on the daemon.
    pub async fn partial_get(&mut self, read: &mut KeyedRead<'_>) -> Result<bool> {
        debug!(ranges = read.ranges.len(), "partial read");
        let mut mb = MessageBuilder::new();
        command::PARTIAL_GET.encode(&mut mb);
        read.key.encode(&mut mb);
        let descriptors: Vec<(u32, u32)> = read
            .ranges
            .iter()
            .map(|r| (r.offset, r.target.len() as u32))
            .collect();
        descriptors.encode(&mut mb);

        let mut m = self.exchange(mb).await?;
        let rc = u32::decode(&mut m)?;
        if rc != return_code::OK {
            return Err(ClientError::OsdStatus { rc });
        }
        let found = bool::decode(&mut m)?;
        if found {
            for range in read.ranges.iter_mut() {
                let data = m.take(range.target.len())?;
                range.target.copy_from_slice(&data);
            }
        }
        Ok(found)
    }

    /// Liveness probe: the daemon's build version.
    pub async fn get_version(&mut self) -> Result<(i32, i32, i32, String)> {
        let mut mb = MessageBuilder::new();
        command::GET_VERSION.encode(&mut mb);
        let mut m = self.exchange(mb).await?;
        let rc = u32::decode(&mut m)?;
        if rc != return_code::OK {
            return Err(ClientError::OsdStatus { rc });
        }
        let major = i32::decode(&mut m)?;
        let minor = i32::decode(&mut m)?;
        let patch = i32::decode(&mut m)?;
        let hash = String::decode(&mut m)?;
        Ok((major, minor, patch, hash))
    }
}
