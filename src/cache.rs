//! Concurrent shell around the LRU
//!
//! One plain mutex covers both paths: reads mutate recency, so a
//! reader/writer split would buy nothing. The LRU itself is built lazily on
//! the first write, so an unused namespace allocates nothing.

use parking_lot::Mutex;

use crate::byteview::ByteView;
use crate::lru::LruCache;

pub(crate) struct MainCache {
    cache_bytes: u64,
    inner: Mutex<Option<LruCache>>,
}

impl MainCache {
    pub(crate) fn new(cache_bytes: u64) -> Self {
        Self {
            cache_bytes,
            inner: Mutex::new(None),
        }
    }

    /// Miss until the first `add` constructs the LRU.
    pub(crate) fn get(&self, key: &str) -> Option<ByteView> {
        self.inner.lock().as_mut()?.get(key)
    }

    pub(crate) fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.inner.lock();
        guard
            .get_or_insert_with(|| LruCache::new(self.cache_bytes, None))
            .add(key, value);
    }

    pub(crate) fn used_bytes(&self) -> u64 {
        self.inner.lock().as_ref().map_or(0, |lru| lru.used_bytes())
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, |lru| lru.len())
    }
}

// =============================================================================
// Tests
// =============================================================================
