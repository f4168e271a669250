//! Size-bounded LRU cache with eviction callbacks
//!
//! Recency is tracked with an intrusive doubly-linked list threaded through a
//! slab of nodes; a hashmap points keys at their slab slots, so `get` and
//! `add` are O(1). The list head is the most recently used entry, the tail
//! the next eviction victim.
//!
//! # Design
//!
//! - Byte accounting: an entry costs `key.len() + value.len()` bytes
//! - `max_bytes == 0` disables eviction entirely
//! - Evictions fire the callback exactly once per removed entry, oldest first
//! - No internal locking; the concurrent shell in [`crate::cache`] guards it

use std::collections::HashMap;
use std::mem;

use crate::byteview::ByteView;

/// Sentinel slot index for list ends.
const NIL: usize = usize::MAX;

/// Callback invoked with each evicted entry.
pub type EvictionCallback = Box<dyn FnMut(String, ByteView) + Send>;

struct Node {
    key: String,
    value: ByteView,
    prev: usize,
    next: usize,
}

/// Bounded in-memory map with LRU eviction.
pub struct LruCache {
    /// Maximum payload bytes, 0 means unbounded
    max_bytes: u64,
    /// Current payload bytes
    used_bytes: u64,
    /// Slab of list nodes; freed slots are recycled
    nodes: Vec<Node>,
    free: Vec<usize>,
    /// Key to slab slot
    index: HashMap<String, usize>,
    /// Most recently used slot
    head: usize,
    /// Least recently used slot
    tail: usize,
    on_evicted: Option<EvictionCallback>,
}

fn entry_cost(key: &str, value: &ByteView) -> u64 {
    (key.len() + value.len()) as u64
}

impl LruCache {
    /// Create a cache holding at most `max_bytes` of keys plus payloads.
    pub fn new(max_bytes: u64, on_evicted: Option<EvictionCallback>) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: NIL,
            tail: NIL,
            on_evicted,
        }
    }

    /// Look up a key, marking it most recently used on a hit.
    pub fn get(&mut self, key: &str) -> Option<ByteView> {
        let slot = *self.index.get(key)?;
        self.detach(slot);
        self.push_front(slot);
        Some(self.nodes[slot].value.clone())
    }

    /// Insert or replace an entry, then evict oldest entries until the cache
    /// fits its byte bound again.
    pub fn add(&mut self, key: impl Into<String>, value: ByteView) {
        let key = key.into();

        if let Some(&slot) = self.index.get(&key) {
            self.detach(slot);
            self.push_front(slot);
            let node = &mut self.nodes[slot];
            self.used_bytes -= node.value.len() as u64;
            self.used_bytes += value.len() as u64;
            node.value = value;
        } else {
            self.used_bytes += entry_cost(&key, &value);
            let slot = self.alloc(key.clone(), value);
            self.push_front(slot);
            self.index.insert(key, slot);
        }

        while self.max_bytes > 0 && self.used_bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    /// Evict the least recently used entry; no-op when empty.
    pub fn remove_oldest(&mut self) {
        let slot = self.tail;
        if slot == NIL {
            return;
        }
        self.detach(slot);

        let node = &mut self.nodes[slot];
        let key = mem::take(&mut node.key);
        let value = mem::take(&mut node.value);
        self.free.push(slot);

        self.index.remove(&key);
        self.used_bytes -= entry_cost(&key, &value);

        if let Some(cb) = self.on_evicted.as_mut() {
            cb(key, value);
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current payload bytes.
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Configured byte bound, 0 means unbounded.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    fn alloc(&mut self, key: String, value: ByteView) -> usize {
        let node = Node {
            key,
            value,
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn detach(&mut self, slot: usize) {
        let prev = self.nodes[slot].prev;
        let next = self.nodes[slot].next;
        match prev {
            NIL => self.head = next,
            p => self.nodes[p].next = next,
        }
        match next {
            NIL => self.tail = prev,
            n => self.nodes[n].prev = prev,
        }
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;
        match self.head {
            NIL => self.tail = slot,
            h => self.nodes[h].prev = slot,
        }
        self.head = slot;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lru_get_hit_and_miss() {
        let mut cache = LruCache::new(0, None);
        cache.add("key1", ByteView::from("1234"));

        assert_eq!(cache.get("key1"), Some(ByteView::from("1234")));
        assert_eq!(cache.get("key2"), None);
    }

    #[test]
    fn test_lru_eviction_drops_oldest() {
        // Room for exactly two of the three 10-byte entries
        let cap = ("key1".len() + "key2".len() + "value1".len() + "value2".len()) as u64;
        let mut cache = LruCache::new(cap, None);

        cache.add("key1", ByteView::from("value1"));
        cache.add("key2", ByteView::from("value2"));
        cache.add("key3", ByteView::from("value3"));

        assert_eq!(cache.get("key1"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_eviction_callback_order() {
        use std::sync::{Arc, Mutex};

        let evicted: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let record = evicted.clone();
        let cb: EvictionCallback = Box::new(move |key, _value| {
            record.lock().unwrap().push(key);
        });

        let mut cache = LruCache::new(10, Some(cb));
        cache.add("key1", ByteView::from("123456"));
        cache.add("k2", ByteView::from("k2"));
        cache.add("k3", ByteView::from("k3"));
        cache.add("k4", ByteView::from("k4"));

        assert_eq!(*evicted.lock().unwrap(), vec!["key1", "k2"]);
    }

    #[test]
    fn test_lru_replace_adjusts_used_bytes() {
        let mut cache = LruCache::new(0, None);
        cache.add("key", ByteView::from("short"));
        assert_eq!(cache.used_bytes(), 8);

        cache.add("key", ByteView::from("a much longer value"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), ("key".len() + "a much longer value".len()) as u64);
        assert_eq!(cache.get("key"), Some(ByteView::from("a much longer value")));
    }

    #[test]
    fn test_lru_get_refreshes_recency() {
        let mut cache = LruCache::new(20, None);
        cache.add("key1", ByteView::from("value1"));
        cache.add("key2", ByteView::from("value2"));

        // Touch key1 so key2 becomes the eviction victim
        cache.get("key1");
        cache.add("key3", ByteView::from("value3"));

        assert!(cache.get("key1").is_some());
        assert_eq!(cache.get("key2"), None);
    }

    #[test]
    fn test_lru_remove_oldest_on_empty_is_noop() {
        let mut cache = LruCache::new(16, None);
        cache.remove_oldest();
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_lru_slot_reuse_after_eviction() {
        let mut cache = LruCache::new(8, None);
        for i in 0..100 {
            cache.add(format!("k{}", i % 4), ByteView::from("val"));
        }
        // Slab never grows past the live entry count plus recycled slots
        assert!(cache.nodes.len() <= 4);
    }

    proptest! {
        #[test]
        fn prop_used_bytes_never_exceeds_bound(
            ops in prop::collection::vec(
                ("[a-d]{1,4}", prop::collection::vec(any::<u8>(), 0..32)),
                1..64,
            )
        ) {
            let max_bytes = 64u64;
            let mut cache = LruCache::new(max_bytes, None);

            for (key, value) in ops {
                cache.add(key, ByteView::new(value));
                prop_assert!(cache.used_bytes() <= max_bytes);
            }
        }

        #[test]
        fn prop_used_bytes_matches_entry_sum(
            ops in prop::collection::vec(
                ("[a-f]{1,6}", prop::collection::vec(any::<u8>(), 0..16)),
                1..64,
            )
        ) {
            let mut cache = LruCache::new(128, None);
            for (key, value) in ops {
                cache.add(key, ByteView::new(value));
            }

            let sum: u64 = cache
                .index
                .iter()
                .map(|(key, &slot)| entry_cost(key, &cache.nodes[slot].value))
                .sum();
            prop_assert_eq!(cache.used_bytes(), sum);
        }
    }
}
