//! Reefstore Client Data Path
//!
//! The caching and routing layer that turns a decoded manifest into
//! concurrent fragment reads:
//! - a namespace-sharded LRU cache of manifests ([`cache`]),
//! - the cluster OSD registry with single-flight refresh ([`registry`]),
//! - per-OSD connection pools and the fragment fetcher ([`pool`],
//!   [`fetcher`]),
//! - the proxy protocol and a facade wiring it all together ([`proxy`]).
//!
//! Socket I/O and the fast-path driver are injected through the traits in
//! [`transport`]; this crate never opens a connection itself.

pub mod asd;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod pool;
pub mod proxy;
pub mod registry;
pub mod transport;

pub use asd::AsdClient;
pub use cache::{LruCache, ManifestCache, ManifestEntry};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use fetcher::OsdAccess;
pub use pool::{AsdConnectionPool, AsdConnectionPools};
pub use proxy::{
    Assert, ObjectInfo, ObjectSlices, ProxyClient, ProxySlice, Sequence, StoreClient, Update,
};
pub use registry::OsdRegistry;
pub use transport::{
    BoxedTransport, Dialer, Endpoint, KeyedRead, RoraConnector, RoraContext, RoraError,
    SliceRange, Transport,
};
