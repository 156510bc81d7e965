//! Cache of compiled artifacts keyed by plan structure.
//!
//! Two independently decoded copies of the same plan are structurally equal,
//! so a member that receives the same plan again reuses the cached value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use gridsql_core::hash::{hash_bytes, Hash256};

use crate::codec::encode_plan;
use crate::node::PhysicalNode;

/// blake3 digest of the plan's wire bytes; stable across members running
/// the same build.
pub fn plan_fingerprint(plan: &PhysicalNode) -> Hash256 {
    hash_bytes(&encode_plan(plan))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<V> {
    value: Arc<V>,
    last_used: u64,
}

struct Inner<V> {
    entries: HashMap<PhysicalNode, Entry<V>>,
    tick: u64,
}

impl<V> Inner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Bounded LRU map from plan to `Arc<V>`. A capacity of 0 disables caching.
pub struct PlanCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> PlanCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                tick: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, plan: &PhysicalNode) -> Option<Arc<V>> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();
        match inner.entries.get_mut(plan) {
            Some(entry) => {
                entry.last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.value))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace; evicts the least recently used entry when full.
    pub fn insert(&self, plan: PhysicalNode, value: V) -> Arc<V> {
        let value = Arc::new(value);
        if self.capacity == 0 {
            return value;
        }
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, plan, Arc::clone(&value));
        value
    }

    /// Return the cached value or build, cache and return a new one. `build`
    /// runs outside the lock; a failed build caches nothing.
    pub fn get_or_insert_with<E, F>(&self, plan: &PhysicalNode, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(v) = self.get(plan) {
            return Ok(v);
        }
        let value = Arc::new(build()?);
        if self.capacity > 0 {
            let mut inner = self.inner.lock();
            // Another thread may have won the race; keep its value.
            if let Some(existing) = inner.entries.get(plan) {
                return Ok(Arc::clone(&existing.value));
            }
            self.insert_locked(&mut inner, plan.clone(), Arc::clone(&value));
        }
        Ok(value)
    }

    fn insert_locked(&self, inner: &mut Inner<V>, plan: PhysicalNode, value: Arc<V>) {
        let tick = inner.next_tick();
        if !inner.entries.contains_key(&plan) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                inner.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(capacity = self.capacity, "plan cache evicted lru entry");
            }
        }
        inner.entries.insert(
            plan,
            Entry {
                value,
                last_used: tick,
            },
        );
    }

    pub fn contains(&self, plan: &PhysicalNode) -> bool {
        self.inner.lock().entries.contains_key(plan)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_plan, DecodeLimits};
    use crate::expr::col;

    fn scan(name: &str) -> PhysicalNode {
        PhysicalNode::scan(name, vec![], None).unwrap()
    }

    #[test]
    fn test_decoded_copy_hits() {
        let plan = PhysicalNode::filter(scan("t"), col(0).is_null());
        let cache = PlanCache::new(4);
        cache.insert(plan.clone(), 7u32);

        let copy = decode_plan(encode_plan(&plan), &DecodeLimits::default()).unwrap();
        assert_eq!(cache.get(&copy).as_deref(), Some(&7));
        assert_eq!(plan_fingerprint(&plan), plan_fingerprint(&copy));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = PlanCache::new(2);
        cache.insert(scan("a"), 1);
        cache.insert(scan("b"), 2);
        assert!(cache.get(&scan("a")).is_some());
        cache.insert(scan("c"), 3);

        assert!(cache.contains(&scan("a")));
        assert!(!cache.contains(&scan("b")));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_get_or_insert_with_builds_once() {
        let cache = PlanCache::new(2);
        let mut builds = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_insert_with(&scan("t"), || {
                    builds += 1;
                    Ok::<_, ()>("compiled")
                })
                .unwrap();
            assert_eq!(*v, "compiled");
        }
        assert_eq!(builds, 1);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_failed_build_not_cached() {
        let cache: PlanCache<u8> = PlanCache::new(2);
        assert!(cache.get_or_insert_with(&scan("t"), || Err("boom")).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = PlanCache::new(0);
        cache.insert(scan("t"), 1);
        assert!(cache.is_empty());
        cache.clear();
    }
}
