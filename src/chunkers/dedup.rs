//! Content-hash deduplication and batch retention.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use uuid::Uuid;

use crate::cache::ShardedCache;
use crate::types::Chunk;

/// blake3 hex digest of whitespace-stripped content.
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.trim().as_bytes()).to_hex().to_string()
}

/// Shared record of content hashes already emitted, with the batch that
/// first emitted each.
pub struct DedupStore {
    hashes: ShardedCache<String, Uuid>,
}

impl DedupStore {
    /// A store holding roughly `capacity` hashes before evicting the least
    /// recently seen.
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: ShardedCache::bounded(capacity),
        }
    }

    /// Register `hash` for `batch_id`. Returns `false` if it was already
    /// registered, in which case the chunk is a duplicate.
    pub fn insert_if_absent(&self, hash: &str, batch_id: Uuid) -> bool {
        self.hashes.insert_if_absent(hash.to_string(), batch_id)
    }

    /// Batch that first emitted `hash`.
    pub fn batch_for(&self, hash: &str) -> Option<Uuid> {
        self.hashes.get(&hash.to_string())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn clear(&self) {
        self.hashes.clear();
    }
}

/// Recently emitted batches, retrievable by id.
pub struct BatchStore {
    batches: Mutex<LruCache<Uuid, Arc<Vec<Chunk>>>>,
}

impl BatchStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            batches: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn store(&self, batch_id: Uuid, chunks: Vec<Chunk>) {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(batch_id, Arc::new(chunks));
    }

    pub fn get(&self, batch_id: &Uuid) -> Option<Arc<Vec<Chunk>>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(batch_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
