//! OSD registry with single-flight refresh
//!
//! The registry holds the cluster topology as an ordered sequence of
//! alba-levels, newest last, replaced as one unit under its own lock.
//! Refreshing is coalesced: concurrent callers produce exactly one remote
//! fetch, the rest wait on the gate and then read whatever that one fetch
//! produced. A failed refresh leaves the registry untouched and fails only
//! the caller that performed the fetch.

use crate::error::{ClientError, Result};
use parking_lot::RwLock;
use reefstore_core::{AlbaId, OsdEntry, OsdId, OsdMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type Levels = Arc<Vec<(AlbaId, OsdMap)>>;

pub struct OsdRegistry {
    levels: RwLock<Levels>,
    /// Completed refresh attempts, successful or not. A waiter that
    /// observes this advance while queued on the gate knows a refresh ran
    /// and must not issue its own fetch.
    attempts: AtomicU64,
    populated: AtomicU64,
    gate: tokio::sync::Mutex<()>,
}

impl OsdRegistry {
    pub fn new() -> Self {
        Self {
            levels: RwLock::new(Arc::new(Vec::new())),
            attempts: AtomicU64::new(0),
            populated: AtomicU64::new(0),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Whether a refresh has ever succeeded.
    pub fn is_populated(&self) -> bool {
        self.populated.load(Ordering::Acquire) != 0
    }

    /// The current topology snapshot, replaced as a unit by refreshes.
    pub fn snapshot(&self) -> Levels {
        Arc::clone(&self.levels.read())
    }

    /// The alba-level ids, oldest first.
    pub fn alba_ids(&self) -> Vec<AlbaId> {
        self.snapshot().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Look up an OSD in the newest alba-level.
    pub fn find_osd(&self, osd: OsdId) -> Option<Arc<OsdEntry>> {
        let snapshot = self.snapshot();
        let (_, newest) = snapshot.last()?;
        newest.get(&osd).map(Arc::clone)
    }

    /// Refresh the topology through `fetch`, single-flight.
    ///
    /// Returns `Ok(true)` when this caller performed the fetch, `Ok(false)`
    /// when it rode along on a refresh that ran while it waited. The fetch
    /// error, if any, reaches only the performing caller.
    pub async fn refresh<F, Fut>(&self, fetch: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(AlbaId, OsdMap)>>>,
    {
        let observed = self.attempts.load(Ordering::Acquire);
        let _gate = self.gate.lock().await;
        if self.attempts.load(Ordering::Acquire) != observed {
            debug!("osd registry refreshed while waiting, riding along");
            return Ok(false);
        }

        info!("refreshing osd registry");
        let outcome = fetch().await;
        self.attempts.fetch_add(1, Ordering::Release);
        match outcome {
            Ok(levels) => {
                info!(levels = levels.len(), "osd registry replaced");
                *self.levels.write() = Arc::new(levels);
                self.populated.store(1, Ordering::Release);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "osd registry refresh failed");
                Err(e)
            }
        }
    }

    /// Make sure the registry has been populated at least once, refreshing
    /// if needed. A first-ever population that fails surfaces the distinct
    /// [`ClientError::RegistryUnavailable`].
    pub async fn ensure_populated<F, Fut>(&self, fetch: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<(AlbaId, OsdMap)>>>,
    {
        if self.is_populated() {
            return Ok(());
        }
        let _ = self
            .refresh(fetch)
            .await
            .map_err(|_| ClientError::RegistryUnavailable)?;
        if self.is_populated() {
            Ok(())
        } else {
            Err(ClientError::RegistryUnavailable)
        }
    }
}

impl Default for OsdRegistry {
    fn default() -> Self {
        Self::new()
    }
}
