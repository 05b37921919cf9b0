//! Proxy client and the data-path facade
//!
//! [`ProxyClient`] owns one transport to the proxy and performs framed
//! request/response exchanges with a per-call deadline. [`StoreClient`]
//! wires the proxy together with the manifest cache and the OSD access
//! layer: manifest-bearing responses populate the cache, namespace
//! invalidation couples the local drop with the remote one, and the OSD
//! registry refreshes itself through the proxy.

use super::messages::{
    read_apply_sequence_response, read_get_fragment_encryption_key_response,
    read_has_local_fragment_cache_response, read_invalidate_cache_response,
    read_osd_info2_response, read_read_objects_slices2_response, read_write_object_fs2_response,
    write_apply_sequence_request, write_get_fragment_encryption_key_request,
    write_has_local_fragment_cache_request, write_invalidate_cache_request,
    write_osd_info2_request, write_read_objects_slices2_request, write_write_object_fs2_request,
    ObjectInfo, ObjectSlices,
};
use super::sequences::Sequence;
use super::{PROXY_MAGIC, PROXY_VERSION};
use crate::cache::{ManifestCache, ManifestEntry};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::fetcher::OsdAccess;
use crate::transport::{read_frame, BoxedTransport, Dialer, Endpoint, RoraConnector};
use bytes::Bytes;
use reefstore_core::osd::OsdMap;
use reefstore_core::{AlbaId, Checksum, NamespaceId};
use reefstore_wire::{Message, MessageBuilder, WireEncode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One framed protocol session with the proxy.
pub struct ProxyClient {
    transport: BoxedTransport,
    timeout: Duration,
}

impl ProxyClient {
    /// Send the session prologue over a freshly dialed transport.
    pub async fn handshake(mut transport: BoxedTransport, timeout: Duration) -> Result<Self> {
        let mut mb = MessageBuilder::new();
        PROXY_MAGIC.encode(&mut mb);
        PROXY_VERSION.encode(&mut mb);
        let prologue = mb.freeze();
        match tokio::time::timeout(timeout, transport.write_exact(&prologue)).await {
            Ok(Ok(())) => Ok(Self { transport, timeout }),
            Ok(Err(e)) => Err(ClientError::Io(e)),
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Dial the proxy and open a session.
    pub async fn connect(
        dialer: &dyn Dialer,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<Self> {
        let transport = dialer.dial(endpoint).await?;
        let client = Self::handshake(transport, timeout).await?;
        info!(endpoint = %endpoint, "proxy session established");
        Ok(client)
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

    /// Fetch the full OSD topology, all alba-levels.
    pub async fn osd_info2(&mut self) -> Result<Vec<(AlbaId, OsdMap)>> {
        let mut mb = MessageBuilder::new();
        write_osd_info2_request(&mut mb);
        let mut m = self.exchange(mb).await?;
        read_osd_info2_response(&mut m)
    }

    /// Read byte ranges of objects into caller buffers; the response also
    /// carries the manifests of the touched objects.
    pub async fn read_objects_slices2(
        &mut self,
        namespace: &str,
        objects: &mut [ObjectSlices<'_>],
        consistent_read: bool,
    ) -> Result<Vec<ObjectInfo>> {
        let mut mb = MessageBuilder::new();
        write_read_objects_slices2_request(&mut mb, namespace, objects, consistent_read);
        let mut m = self.exchange(mb).await?;
        read_read_objects_slices2_response(&mut m, objects)
    }

    /// Upload an object from a file readable by the proxy; returns the
    /// resulting manifest.
    pub async fn write_object_fs2(
        &mut self,
        namespace: &str,
        object_name: &str,
        input_file: &str,
        allow_overwrite: bool,
        checksum: Option<&Checksum>,
    ) -> Result<ManifestEntry> {
        let mut mb = MessageBuilder::new();
        write_write_object_fs2_request(
            &mut mb,
            namespace,
            object_name,
            input_file,
            allow_overwrite,
            checksum,
        );
        let mut m = self.exchange(mb).await?;
        Ok(Arc::new(read_write_object_fs2_response(&mut m)?))
    }

    /// Apply an assert/update sequence atomically; returns the manifests
    /// of the objects the updates produced.
    pub async fn apply_sequence(
        &mut self,
        namespace: &str,
        write_barrier: bool,
        sequence: &Sequence,
    ) -> Result<Vec<ObjectInfo>> {
        let mut mb = MessageBuilder::new();
        write_apply_sequence_request(&mut mb, namespace, write_barrier, sequence);
        let mut m = self.exchange(mb).await?;
        read_apply_sequence_response(&mut m)
    }

    /// Tell the proxy to drop its own caches for a namespace.
    pub async fn invalidate_cache(&mut self, namespace: &str) -> Result<()> {
        let mut mb = MessageBuilder::new();
        write_invalidate_cache_request(&mut mb, namespace);
        let mut m = self.exchange(mb).await?;
        read_invalidate_cache_response(&mut m)
    }

    pub async fn has_local_fragment_cache(&mut self) -> Result<bool> {
        let mut mb = MessageBuilder::new();
        write_has_local_fragment_cache_request(&mut mb);
        let mut m = self.exchange(mb).await?;
        read_has_local_fragment_cache_response(&mut m)
    }

    /// Fetch the key material identifier for a namespace's fragment
    /// encryption; the decryption collaborator consumes it.
    pub async fn get_fragment_encryption_key(
        &mut self,
        alba_id: &str,
        namespace_id: NamespaceId,
    ) -> Result<Option<Bytes>> {
        let mut mb = MessageBuilder::new();
        write_get_fragment_encryption_key_request(&mut mb, alba_id, namespace_id);
        let mut m = self.exchange(mb).await?;
        read_get_fragment_encryption_key_response(&mut m)
    }
}

/// The client data path as one handle: proxy RPC, manifest cache and OSD
/// access, explicitly constructed from an injected configuration.
pub struct StoreClient {
    proxy: tokio::sync::Mutex<ProxyClient>,
    cache: Arc<ManifestCache>,
    osd_access: Arc<OsdAccess>,
}

impl StoreClient {
    pub fn new(proxy: ProxyClient, cache: Arc<ManifestCache>, osd_access: Arc<OsdAccess>) -> Self {
        Self {
            proxy: tokio::sync::Mutex::new(proxy),
            cache,
            osd_access,
        }
    }

    /// Dial the proxy and assemble the full data path from `config`.
    pub async fn connect(
        dialer: Arc<dyn Dialer>,
        proxy_endpoint: &Endpoint,
        rora_connector: Option<Arc<dyn RoraConnector>>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let proxy =
            ProxyClient::connect(dialer.as_ref(), proxy_endpoint, config.proxy.request_timeout())
                .await?;
        let cache = Arc::new(ManifestCache::new(config.cache.manifest_capacity));
        let osd_access = Arc::new(OsdAccess::new(dialer, rora_connector, config));
        Ok(Self::new(proxy, cache, osd_access))
    }

    pub fn manifest_cache(&self) -> &Arc<ManifestCache> {
        &self.cache
    }

    pub fn osd_access(&self) -> &Arc<OsdAccess> {
        &self.osd_access
    }

    /// Refresh the OSD registry through the proxy (single-flight).
    pub async fn refresh_topology(&self) -> Result<bool> {
        self.osd_access
            .registry()
            .refresh(|| async { self.proxy.lock().await.osd_info2().await })
            .await
    }

    async fn ensure_topology(&self) -> Result<()> {
        self.osd_access
            .registry()
            .ensure_populated(|| async { self.proxy.lock().await.osd_info2().await })
            .await
    }

    /// The cluster identity manifests are cached under, i.e. the first
    /// alba-level of the topology.
    async fn home_alba_id(&self) -> Result<AlbaId> {
        self.ensure_topology().await?;
        self.osd_access
            .registry()
            .alba_ids()
            .into_iter()
            .next()
            .ok_or(ClientError::RegistryUnavailable)
    }

    fn cache_object_infos(&self, namespace: &str, alba_id: &str, infos: &[ObjectInfo]) {
        for info in infos {
            self.cache
                .put(namespace, alba_id, Arc::clone(&info.manifest));
        }
    }

    /// Look up a manifest in the cache without touching the network
    /// beyond first-time topology population.
    pub async fn cached_manifest(
        &self,
        namespace: &str,
        object_name: &str,
    ) -> Result<Option<ManifestEntry>> {
        let alba_id = self.home_alba_id().await?;
        Ok(self.cache.get(namespace, &alba_id, object_name))
    }

    /// Proxy-path object read; the manifests riding on the response are
    /// inserted into the cache for later fragment-path reads.
    pub async fn read_objects_slices(
        &self,
        namespace: &str,
        objects: &mut [ObjectSlices<'_>],
        consistent_read: bool,
    ) -> Result<Vec<ObjectInfo>> {
        let infos = {
            let mut proxy = self.proxy.lock().await;
            proxy
                .read_objects_slices2(namespace, objects, consistent_read)
                .await?
        };
        debug!(
            namespace,
            manifests = infos.len(),
            "caching manifests from slice read"
        );
        let alba_id = self.home_alba_id().await?;
        self.cache_object_infos(namespace, &alba_id, &infos);
        Ok(infos)
    }

    /// Apply an assert/update sequence; resulting manifests are cached.
    pub async fn apply_sequence(
        &self,
        namespace: &str,
        write_barrier: bool,
        sequence: &Sequence,
    ) -> Result<Vec<ObjectInfo>> {
        let infos = {
            let mut proxy = self.proxy.lock().await;
            proxy.apply_sequence(namespace, write_barrier, sequence).await?
        };
        let alba_id = self.home_alba_id().await?;
        self.cache_object_infos(namespace, &alba_id, &infos);
        Ok(infos)
    }

    /// Upload an object from a proxy-readable file; the resulting
    /// manifest is cached.
    pub async fn write_object_from_file(
        &self,
        namespace: &str,
        object_name: &str,
        input_file: &str,
        allow_overwrite: bool,
        checksum: Option<&Checksum>,
    ) -> Result<ManifestEntry> {
        let manifest = {
            let mut proxy = self.proxy.lock().await;
            proxy
                .write_object_fs2(namespace, object_name, input_file, allow_overwrite, checksum)
                .await?
        };
        let alba_id = self.home_alba_id().await?;
        self.cache.put(namespace, &alba_id, Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Drop the namespace locally and remotely.
    pub async fn invalidate_namespace(&self, namespace: &str) -> Result<()> {
        self.cache.invalidate(namespace);
        self.proxy.lock().await.invalidate_cache(namespace).await
    }
}
