//! Per-OSD connection pools
//!
//! Each OSD gets its own pool of direct-protocol connections, capped at
//! the configured size. Failures are counted per pool; once the threshold
//! is passed the pool stops handing out connections and the OSD is treated
//! as disqualified. A connection whose exchange failed or timed out is in
//! an unknown state and must be dropped by the caller, never released.

use crate::asd::AsdClient;
use crate::config::OsdSettings;
use crate::error::{ClientError, Result};
use crate::transport::{Dialer, Endpoint};
use parking_lot::Mutex;
use reefstore_core::{OsdEntry, OsdId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct AsdConnectionPool {
    osd: OsdId,
    endpoint: Endpoint,
    long_id: String,
    dialer: Arc<dyn Dialer>,
    idle: Mutex<Vec<AsdClient>>,
    size: usize,
    timeout: Duration,
    failures: AtomicU64,
    failure_threshold: u64,
}

impl AsdConnectionPool {
    fn new(
        osd: OsdId,
        entry: &OsdEntry,
        dialer: Arc<dyn Dialer>,
        size: usize,
        timeout: Duration,
        failure_threshold: u64,
    ) -> Self {
        let endpoint = Endpoint {
            transport: entry.info.primary_transport().to_string(),
            ip: entry.info.ips.first().cloned().unwrap_or_default(),
            port: entry.info.port,
        };
        Self {
            osd,
            endpoint,
            long_id: entry.info.long_id.clone(),
            dialer,
            idle: Mutex::new(Vec::new()),
            size,
            timeout,
            failures: AtomicU64::new(0),
            failure_threshold,
        }
    }

    /// Reuse an idle connection or dial a new one. Refuses once the OSD is
    /// disqualified.
    pub async fn get(&self) -> Result<AsdClient> {
        if self.is_disqualified() {
            warn!(osd = %self.osd, "pool refuses disqualified osd");
            return Err(ClientError::OsdDisqualified(self.osd));
        }
        if let Some(client) = self.idle.lock().pop() {
            return Ok(client);
        }
        debug!(osd = %self.osd, endpoint = %self.endpoint, "dialing osd");
        let transport = self
            .dialer
            .dial(&self.endpoint)
            .await
            .map_err(|e| ClientError::Connection {
                osd: self.osd,
                reason: e.to_string(),
            })?;
        AsdClient::handshake(transport, Some(&self.long_id), self.timeout).await
    }

    /// Return a healthy connection; surplus connections past the pool size
    /// are dropped.
    pub fn release(&self, client: AsdClient) {
        let mut idle = self.idle.lock();
        if idle.len() < self.size {
            idle.push(client);
        }
    }

    /// Count one failed exchange; returns the new total.
    pub fn report_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn is_disqualified(&self) -> bool {
        self.failure_count() >= self.failure_threshold
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Keyed map of per-OSD pools, guarded by its own lock so a slow dial on
/// one OSD never blocks pool lookups for another.
pub struct AsdConnectionPools {
    pools: Mutex<HashMap<OsdId, Arc<AsdConnectionPool>>>,
    dialer: Arc<dyn Dialer>,
    size: usize,
    timeout: Duration,
    failure_threshold: u64,
}

impl AsdConnectionPools {
    pub fn new(dialer: Arc<dyn Dialer>, settings: &OsdSettings) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            dialer,
            size: settings.connection_pool_size,
            timeout: settings.partial_read_timeout(),
            failure_threshold: settings.failure_threshold,
        }
    }

    pub fn get_or_create(&self, osd: OsdId, entry: &OsdEntry) -> Arc<AsdConnectionPool> {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&osd) {
            return Arc::clone(pool);
        }
        let pool = Arc::new(AsdConnectionPool::new(
            osd,
            entry,
            Arc::clone(&self.dialer),
            self.size,
            self.timeout,
            self.failure_threshold,
        ));
        pools.insert(osd, Arc::clone(&pool));
        pool
    }

    pub fn pool_count(&self) -> usize {
        self.pools.lock().len()
    }
}
