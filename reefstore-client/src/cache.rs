//! Manifest caching
//!
//! A two-level structure: an outer map from namespace name to that
//! namespace's own `(LRU, lock)` pair. The outer lock guards only the
//! outer map's mutation, so cache traffic in different namespaces never
//! contends. Entries are shared immutable manifests; replacement is a new
//! entry, never an in-place mutation.

use parking_lot::Mutex;
use reefstore_core::{AlbaId, ManifestWithNamespaceId};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Exact least-recently-used cache.
///
/// Recency order lives in a queue: most recent at the back, eviction from
/// the front. Capacity is fixed at construction.
pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn touch(&mut self, key: &K) {
        if let Some(idx) = self.order.iter().position(|k| k == key) {
            self.order.remove(idx);
        }
        self.order.push_back(key.clone());
    }

    /// Look up a key, marking it most recently used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.map.contains_key(key) {
            self.touch(key);
        }
        self.map.get(key)
    }

    /// Insert or replace, evicting the least-recently-used entry when the
    /// cache is over capacity. Returns the evicted entry, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.touch(&key);
        self.map.insert(key, value);
        if self.map.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                return self.map.remove(&oldest).map(|v| (oldest, v));
            }
        }
        None
    }
}

/// Shared, immutable cache entry.
pub type ManifestEntry = Arc<ManifestWithNamespaceId>;

type CacheKey = (AlbaId, String);
type NamespaceLru = LruCache<CacheKey, ManifestEntry>;

/// Namespace-sharded LRU cache of decoded manifests.
pub struct ManifestCache {
    capacity: usize,
    namespaces: Mutex<HashMap<String, Arc<Mutex<NamespaceLru>>>>,
}

impl ManifestCache {
    /// The capacity applies to every per-namespace LRU created from now
    /// on; it is fixed per namespace at creation time.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    fn namespace_cache(&self, namespace: &str) -> Arc<Mutex<NamespaceLru>> {
        let mut outer = self.namespaces.lock();
        if let Some(existing) = outer.get(namespace) {
            return Arc::clone(existing);
        }
        debug!(namespace, "new manifest cache shard");
        let created = Arc::new(Mutex::new(LruCache::new(self.capacity)));
        outer.insert(namespace.to_string(), Arc::clone(&created));
        created
    }

    /// Insert a manifest under `(alba_id, manifest.name)`, becoming the
    /// namespace's most recently used entry.
    pub fn put(&self, namespace: &str, alba_id: &str, manifest: ManifestEntry) {
        debug!(
            namespace,
            alba_id,
            object = %manifest.manifest.name,
            "manifest cache put"
        );
        let shard = self.namespace_cache(namespace);
        let key = (alba_id.to_string(), manifest.manifest.name.clone());
        shard.lock().insert(key, manifest);
    }

    /// Look up a manifest; a miss has no side effects.
    pub fn get(
        &self,
        namespace: &str,
        alba_id: &str,
        object_name: &str,
    ) -> Option<ManifestEntry> {
        let shard = {
            let outer = self.namespaces.lock();
            Arc::clone(outer.get(namespace)?)
        };
        let key = (alba_id.to_string(), object_name.to_string());
        let result = shard.lock().get(&key).cloned();
        result
    }

    /// Drop the whole namespace; subsequent lookups miss until the
    /// namespace is repopulated.
    pub fn invalidate(&self, namespace: &str) {
        debug!(namespace, "manifest cache invalidate");
        self.namespaces.lock().remove(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reefstore_core::{
        Checksum, Compression, EncodingScheme, EncryptInfo, Fragment, FragmentLocation,
        Manifest, NamespaceId, OsdId,
    };

    fn entry(name: &str) -> ManifestEntry {
        let scheme = EncodingScheme { k: 1, m: 1, w: 8 };
        let fragment = |osd| Fragment {
            location: FragmentLocation {
                osd: Some(OsdId(osd)),
                version: 0,
            },
            checksum: Checksum::NoChecksum,
            packed_length: 16,
            ctr: None,
            fnr: None,
        };
        Arc::new(ManifestWithNamespaceId {
            manifest: Manifest {
                name: name.to_string(),
                object_id: Bytes::from_static(b"id"),
                chunk_sizes: vec![16],
                encoding_scheme: scheme,
                compression: Compression::NoCompression,
                encrypt_info: EncryptInfo::NoEncryption,
                checksum: Checksum::NoChecksum,
                size: 16,
                fragments: vec![vec![fragment(0), fragment(1)]],
                version_id: 0,
                max_disks_per_node: 0,
                timestamp: 0.0,
            },
            namespace_id: NamespaceId(1),
        })
    }

    #[test]
    fn test_put_then_get_same_namespace() {
        let cache = ManifestCache::new(4);
        let mf = entry("obj-1");
        cache.put("ns", "alba-a", Arc::clone(&mf));
        let hit = cache.get("ns", "alba-a", "obj-1").unwrap();
        assert!(Arc::ptr_eq(&hit, &mf));
    }

    #[test]
    fn test_other_namespace_misses() {
        let cache = ManifestCache::new(4);
        cache.put("ns", "alba-a", entry("obj-1"));
        assert!(cache.get("other", "alba-a", "obj-1").is_none());
    }

    #[test]
    fn test_alba_id_is_part_of_the_key() {
        let cache = ManifestCache::new(4);
        cache.put("ns", "alba-a", entry("obj-1"));
        assert!(cache.get("ns", "alba-b", "obj-1").is_none());
    }

    #[test]
    fn test_invalidate_drops_namespace() {
        let cache = ManifestCache::new(4);
        cache.put("ns", "alba-a", entry("obj-1"));
        cache.put("ns", "alba-a", entry("obj-2"));
        cache.invalidate("ns");
        assert!(cache.get("ns", "alba-a", "obj-1").is_none());
        assert!(cache.get("ns", "alba-a", "obj-2").is_none());
    }

    #[test]
    fn test_capacity_evicts_exactly_the_lru_entry() {
        let cache = ManifestCache::new(3);
        cache.put("ns", "a", entry("obj-0"));
        cache.put("ns", "a", entry("obj-1"));
        cache.put("ns", "a", entry("obj-2"));
        // touch obj-0 so obj-1 becomes the least recently used
        assert!(cache.get("ns", "a", "obj-0").is_some());
        cache.put("ns", "a", entry("obj-3"));

        assert!(cache.get("ns", "a", "obj-1").is_none());
        for survivor in ["obj-0", "obj-2", "obj-3"] {
            assert!(cache.get("ns", "a", survivor).is_some(), "{survivor}");
        }
    }

    #[test]
    fn test_capacity_applies_per_namespace_at_creation() {
        let cache = ManifestCache::new(2);
        cache.put("ns-a", "a", entry("obj-0"));
        cache.put("ns-a", "a", entry("obj-1"));
        cache.put("ns-b", "a", entry("obj-0"));
        cache.put("ns-b", "a", entry("obj-1"));
        // both namespaces hold their full capacity independently
        assert!(cache.get("ns-a", "a", "obj-0").is_some());
        assert!(cache.get("ns-b", "a", "obj-1").is_some());
    }

    #[test]
    fn test_replacement_is_a_new_entry() {
        let cache = ManifestCache::new(4);
        let first = entry("obj-1");
        let second = entry("obj-1");
        cache.put("ns", "a", Arc::clone(&first));
        cache.put("ns", "a", Arc::clone(&second));
        let hit = cache.get("ns", "a", "obj-1").unwrap();
        assert!(Arc::ptr_eq(&hit, &second));
        assert!(!Arc::ptr_eq(&hit, &first));
    }

    #[test]
    fn test_lru_insert_returns_evicted() {
        let mut lru: LruCache<u32, &str> = LruCache::new(2);
        assert!(lru.insert(1, "a").is_none());
        assert!(lru.insert(2, "b").is_none());
        let evicted = lru.insert(3, "c").unwrap();
        assert_eq!(evicted, (1, "a"));
        assert_eq!(lru.len(), 2);
    }
}
