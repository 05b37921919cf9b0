//! Transport collaborator seams
//!
//! Socket I/O is not implemented here: the data path consumes these traits
//! and the embedding process injects the real thing. Deadlines are applied
//! by the callers (`tokio::time::timeout` around each exchange); a
//! transport whose exchange timed out is in an unknown state and must be
//! dropped, never reused.

use async_trait::async_trait;
use bytes::Bytes;
use reefstore_wire::Message;
use thiserror::Error;

/// Byte-exact stream to one peer.
#[async_trait]
pub trait Transport: Send {
    async fn write_exact(&mut self, buf: &[u8]) -> std::io::Result<()>;
    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()>;
}

pub type BoxedTransport = Box<dyn Transport>;

/// Where to dial a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Transport kind hint, `"tcp"` or `"rdma"`.
    pub transport: String,
    pub ip: String,
    pub port: u32,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.transport, self.ip, self.port)
    }
}

/// Opens transports; injected by the embedding process.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &Endpoint) -> std::io::Result<BoxedTransport>;
}

/// Error surface of the fast-path context.
#[derive(Error, Debug)]
pub enum RoraError {
    /// The context lost its connection; the holder must drop it and
    /// reconnect on next use.
    #[error("fast-path context disconnected")]
    Disconnected,

    #[error("fast-path read failed: {0}")]
    Io(String),
}

/// One offset/length read into a caller-supplied buffer.
pub struct SliceRange<'a> {
    pub offset: u32,
    pub target: &'a mut [u8],
}

/// A batched read against the fast-path context: all ranges address the
/// fragment stored under `key`.
pub struct KeyedRead<'a> {
    pub key: Bytes,
    pub ranges: Vec<SliceRange<'a>>,
}

/// Direct asynchronous read context to one OSD (the rora bypass path).
#[async_trait]
pub trait RoraContext: Send + Sync {
    /// Issue a vectorized batch of reads and wait for completion.
    async fn read_vectored(&self, reads: &mut [KeyedRead<'_>]) -> Result<(), RoraError>;
}

/// Creates fast-path contexts; injected by the embedding process.
#[async_trait]
pub trait RoraConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> std::io::Result<std::sync::Arc<dyn RoraContext>>;
}

/// Read one length-prefixed frame into a decode cursor.
pub(crate) async fn read_frame(transport: &mut dyn Transport) -> std::io::Result<Message> {
    let mut len_bytes = [0u8; 4];
    transport.read_exact(&mut len_bytes).await?;
    let len = u32::from_ne_bytes(len_bytes) as usize;
    let mut body = vec![0u8; len];
    transport.read_exact(&mut body).await?;
    Ok(Message::new(Bytes::from(body)))
}
