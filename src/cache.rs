//! Sharded concurrent cache with atomic insert-if-absent.
//!
//! Backs the classification memo and the content-hash dedup store. Each
//! shard is an [`LruCache`] behind its own mutex, so a check and the insert
//! that follows it happen under one lock. Values are computed outside the
//! lock; when two callers race on the same key the first insert wins and
//! both observe the same stored value.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

const DEFAULT_SHARDS: usize = 16;

/// Concurrent key-value store, optionally bounded per shard.
pub struct ShardedCache<K, V> {
    shards: Vec<Mutex<LruCache<K, V>>>,
}

impl<K: Hash + Eq, V: Clone> ShardedCache<K, V> {
    /// An unbounded cache.
    pub fn unbounded() -> Self {
        Self {
            shards: (0..DEFAULT_SHARDS)
                .map(|_| Mutex::new(LruCache::unbounded()))
                .collect(),
        }
    }

    /// A cache holding roughly `capacity` entries in total, evicting least
    /// recently used entries per shard.
    pub fn bounded(capacity: usize) -> Self {
        let per_shard = NonZeroUsize::new(capacity.div_ceil(DEFAULT_SHARDS).max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            shards: (0..DEFAULT_SHARDS)
                .map(|_| Mutex::new(LruCache::new(per_shard)))
                .collect(),
        }
    }

    fn shard(&self, key: &K) -> MutexGuard<'_, LruCache<K, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        self.shards[idx].lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.shard(key).get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).contains(key)
    }

    /// Insert `value` unless the key is present. Returns `true` if inserted.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut shard = self.shard(&key);
        if shard.contains(&key) {
            return false;
        }
        shard.put(key, value);
        true
    }

    /// Return the stored value, computing and storing it if absent.
    ///
    /// `compute` runs without holding the shard lock.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        let mut shard = self.shard(&key);
        if let Some(existing) = shard.get(&key) {
            return existing.clone();
        }
        shard.put(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_insert_if_absent() {
        let cache: ShardedCache<String, u32> = ShardedCache::unbounded();
        assert!(cache.insert_if_absent("a".into(), 1));
        assert!(!cache.insert_if_absent("a".into(), 2));
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_insert_with_computes_once_when_present() {
        let cache: ShardedCache<u32, u32> = ShardedCache::unbounded();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache.get_or_insert_with(7, || {
                calls.fetch_add(1, Ordering::SeqCst);
                49
            });
            assert_eq!(v, 49);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bounded_evicts() {
        let cache: ShardedCache<u32, ()> = ShardedCache::bounded(16);
        for i in 0..1000 {
            cache.insert_if_absent(i, ());
        }
        assert!(cache.len() <= 16);
    }

    #[test]
    fn test_concurrent_insert_is_at_most_once() {
        let cache: Arc<ShardedCache<u32, usize>> = Arc::new(ShardedCache::unbounded());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    for key in 0..100 {
                        if cache.insert_if_absent(key, t) {
                            winners.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 100);
        assert_eq!(cache.len(), 100);
    }
}
