//! Fragment fetcher
//!
//! Resolves each fragment location to connectivity and performs the
//! partial reads. Every OSD is handled independently: one unreachable or
//! misbehaving daemon fails only its own slices, and the caller decides
//! whether the surviving `k` of `k + m` fragments suffice to reconstruct.
//!
//! Two routing strategies per OSD, selected by its advertised
//! capabilities: the pooled direct protocol, or the fast-path context
//! (rora bypass) when a rora port is published and a connector was
//! injected.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::pool::AsdConnectionPools;
use crate::registry::OsdRegistry;
use crate::transport::{Dialer, Endpoint, KeyedRead, RoraConnector, RoraContext, RoraError};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reefstore_core::{OsdEntry, OsdId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OSD topology plus the connection machinery to read from it.
pub struct OsdAccess {
    registry: OsdRegistry,
    pools: AsdConnectionPools,
    contexts: Mutex<HashMap<OsdId, Arc<dyn RoraContext>>>,
    rora_connector: Option<Arc<dyn RoraConnector>>,
    use_fast_path: bool,
}

impl OsdAccess {
    pub fn new(
        dialer: Arc<dyn Dialer>,
        rora_connector: Option<Arc<dyn RoraConnector>>,
        config: &ClientConfig,
    ) -> Self {
        let use_fast_path = config.osd.use_fast_path && rora_connector.is_some();
        Self {
            registry: OsdRegistry::new(),
            pools: AsdConnectionPools::new(dialer, &config.osd),
            contexts: Mutex::new(HashMap::new()),
            rora_connector,
            use_fast_path,
        }
    }

    pub fn registry(&self) -> &OsdRegistry {
        &self.registry
    }

    /// Read every OSD's slice set, concurrently, reporting one outcome per
    /// OSD. No outcome aborts a sibling's fetch.
    pub async fn read_osds_slices<'a>(
        &self,
        per_osd: Vec<(OsdId, Vec<KeyedRead<'a>>)>,
    ) -> Vec<(OsdId, Result<()>)> {
        let reads = per_osd.into_iter().map(|(osd, mut slices)| async move {
            let outcome = self.read_one_osd(osd, &mut slices).await;
            if let Err(e) = &outcome {
                warn!(osd = %osd, error = %e, "osd read failed");
            }
            (osd, outcome)
        });
        futures::future::join_all(reads).await
    }

    async fn read_one_osd(&self, osd: OsdId, reads: &mut [KeyedRead<'_>]) -> Result<()> {
        let entry = self
            .registry
            .find_osd(osd)
            .ok_or(ClientError::UnknownOsd(osd))?;

        if self.use_fast_path && entry.caps.supports_rora() {
            self.read_fast_path(osd, &entry, reads).await
        } else {
            self.read_direct_path(osd, &entry, reads).await
        }
    }

    async fn read_direct_path(
        &self,
        osd: OsdId,
        entry: &OsdEntry,
        reads: &mut [KeyedRead<'_>],
    ) -> Result<()> {
        let pool = self.pools.get_or_create(osd, entry);
        let mut client = pool.get().await?;
        for read in reads.iter_mut() {
            match client.partial_get(read).await {
                Ok(true) => {}
                Ok(false) => {
                    // the daemon is healthy, the fragment just is not
                    // there; the connection goes back to its pool
                    pool.release(client);
                    return Err(ClientError::FragmentMissing { osd });
                }
                Err(e) => {
                    let failures = pool.report_failure();
                    info!(osd = %osd, failures, error = %e, "dropping connection after failed exchange");
                    // the connection's state is unknown; it is destroyed,
                    // not released
                    return Err(match e {
                        ClientError::Timeout(_) | ClientError::OsdStatus { .. } => e,
                        other => ClientError::Connection {
                            osd,
                            reason: other.to_string(),
                        },
                    });
                }
            }
        }
        pool.release(client);
        Ok(())
    }

    async fn read_fast_path(
        &self,
        osd: OsdId,
        entry: &OsdEntry,
        reads: &mut [KeyedRead<'_>],
    ) -> Result<()> {
        let context = match self.find_context(osd) {
            Some(context) => context,
            None => self.open_context(osd, entry).await?,
        };
        match context.read_vectored(reads).await {
            Ok(()) => Ok(()),
            Err(RoraError::Disconnected) => {
                info!(osd = %osd, "removing disconnected fast-path context");
                self.contexts.lock().remove(&osd);
                Err(ClientError::Connection {
                    osd,
                    reason: "fast-path context disconnected".to_string(),
                })
            }
            Err(RoraError::Io(reason)) => Err(ClientError::Connection { osd, reason }),
        }
    }

    fn find_context(&self, osd: OsdId) -> Option<Arc<dyn RoraContext>> {
        self.contexts.lock().get(&osd).map(Arc::clone)
    }

    async fn open_context(&self, osd: OsdId, entry: &OsdEntry) -> Result<Arc<dyn RoraContext>> {
        let connector = self
            .rora_connector
            .as_ref()
            .ok_or(ClientError::UnknownOsd(osd))?;
        let endpoint = rora_endpoint(entry).ok_or_else(|| ClientError::Connection {
            osd,
            reason: "no usable fast-path endpoint".to_string(),
        })?;
        debug!(osd = %osd, endpoint = %endpoint, "opening fast-path context");
        let context = connector
            .connect(&endpoint)
            .await
            .map_err(|e| ClientError::Connection {
                osd,
                reason: e.to_string(),
            })?;
        self.contexts
            .lock()
            .insert(osd, Arc::clone(&context));
        Ok(context)
    }

    pub fn context_count(&self) -> usize {
        self.contexts.lock().len()
    }
}

/// Pick the fast-path endpoint from capability hints, falling back to the
/// OSD's primary transport and ip where no override is advertised.
fn rora_endpoint(entry: &OsdEntry) -> Option<Endpoint> {
    let port = entry.caps.rora_port?;
    let transport = entry
        .caps
        .rora_transport
        .clone()
        .unwrap_or_else(|| entry.info.primary_transport().to_string());
    let ip = entry
        .caps
        .rora_ips
        .as_ref()
        .and_then(|ips| ips.choose(&mut rand::thread_rng()).cloned())
        .or_else(|| entry.info.ips.first().cloned())?;
    Some(Endpoint {
        transport,
        ip,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reefstore_core::{OsdCapabilities, OsdInfo};

    fn entry_with_caps(caps: OsdCapabilities) -> OsdEntry {
        OsdEntry {
            info: OsdInfo {
                long_id: "osd-long".to_string(),
                ips: vec!["10.1.1.1".to_string()],
                port: 8000,
                use_rdma: false,
                node_id: "node".to_string(),
            },
            caps,
        }
    }

    #[test]
    fn test_rora_endpoint_requires_port() {
        let entry = entry_with_caps(OsdCapabilities::default());
        assert!(rora_endpoint(&entry).is_none());
    }

    #[test]
    fn test_rora_endpoint_falls_back_to_primary() {
        let entry = entry_with_caps(OsdCapabilities {
            rora_port: Some(9000),
            rora_transport: None,
            rora_ips: None,
        });
        let endpoint = rora_endpoint(&entry).unwrap();
        assert_eq!(endpoint.transport, "tcp");
        assert_eq!(endpoint.ip, "10.1.1.1");
        assert_eq!(endpoint.port, 9000);
    }

    #[test]
    fn test_rora_endpoint_prefers_capability_hints() {
        let entry = entry_with_caps(OsdCapabilities {
            rora_port: Some(9000),
            rora_transport: Some("rdma".to_string()),
            rora_ips: Some(vec!["10.2.2.2".to_string()]),
        });
        let endpoint = rora_endpoint(&entry).unwrap();
        assert_eq!(endpoint.transport, "rdma");
        assert_eq!(endpoint.ip, "10.2.2.2");
    }
}
