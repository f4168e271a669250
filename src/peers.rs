//! Peer capability traits
//!
//! The group layer consumes two narrow contracts: a picker that routes a key
//! to the owning peer, and a client that fetches from one. The HTTP cluster
//! binding in [`crate::http`] implements both; tests plug in fakes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Picks the owning peer for a key.
pub trait PeerPicker: Send + Sync {
    /// Client for the remote owner of `key`, or `None` when the owner is
    /// this node or no peers are known. Implementations must short-circuit
    /// the self case so the group never RPCs itself.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerClient>>;
}

/// Fetches a value from one remote peer.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetch the value for `key` in namespace `group` from the peer.
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes>;
}
