//! Consistent-hash ring with virtual nodes
//!
//! Maps arbitrary key strings to the node that owns them. Each real node is
//! projected onto the ring as `replicas` virtual positions so load spreads
//! evenly; membership changes move only the keys adjacent to the changed
//! positions.
//!
//! The virtual label for replica `i` of node `k` is the decimal index
//! prepended to the node id (`"0k"`, `"1k"`, …). Every node in the cluster
//! must derive labels identically, otherwise peers disagree on ownership —
//! do not change this scheme without versioning the cluster.
//!
//! No internal locking: `add` and `get` interleaving requires external
//! synchronization (the HTTP pool wraps the ring in a RwLock).

use std::collections::HashMap;

/// Pluggable 32-bit hash over ring labels and keys.
pub type HashFn = fn(&[u8]) -> u32;

/// Virtual nodes per real node when none is specified.
pub const DEFAULT_REPLICAS: usize = 50;

/// Consistent-hash ring mapping keys to node identifiers.
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Ring positions, sorted ascending
    positions: Vec<u32>,
    /// Position to real node id
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Create a ring with `replicas` virtual nodes per real node and an
    /// optional hash override. The default hash is CRC-32/IEEE.
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or(crc32fast::hash),
            replicas,
            positions: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Add real nodes to the ring. Positions accumulate across calls.
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for node in nodes {
            let node = node.into();
            for i in 0..self.replicas {
                let label = format!("{}{}", i, node);
                let position = (self.hash)(label.as_bytes());
                self.positions.push(position);
                self.nodes.insert(position, node.clone());
            }
        }
        self.positions.sort_unstable();
    }

    /// Owner node for `key`, or `None` on an empty ring.
    ///
    /// Walks clockwise to the first position at or after the key's hash,
    /// wrapping to the smallest position past the top of the ring.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }
        let h = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&p| p < h);
        let position = self.positions[idx % self.positions.len()];
        self.nodes.get(&position).map(String::as_str)
    }

    /// Check if the ring has no nodes.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
