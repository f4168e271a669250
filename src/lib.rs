//! meshcache - Distributed Read-Through In-Memory Cache
//!
//! A symmetric peer cluster of bounded in-memory caches. Keys are
//! partitioned across nodes by consistent hashing; any node can serve any
//! key by answering from its own cache, forwarding to the owning peer, or
//! invoking a user-supplied loader as last resort.
//!
//! # Architecture
//!
//! ```text
//! Group::get(key)
//!   │
//!   ├── local cache hit ────────────────────────────────▶ value
//!   │
//!   └── miss ──▶ single-flight gate (one load per key)
//!                  │
//!                  ├── hash ring picks a remote owner ──▶ peer HTTP fetch
//!                  │     └── failure falls through
//!                  └── loader ──▶ populate local cache ─▶ value
//! ```
//!
//! Four properties hold under concurrent load:
//!
//! - the local cache never exceeds its byte bound (LRU eviction)
//! - at most one load per key is in flight per node (single-flight)
//! - every node agrees on which peer owns a key (deterministic ring)
//! - peer failures degrade to local loads, never to errors
//!
//! # Modules
//!
//! - [`byteview`] - Immutable value wrapper for cached payloads
//! - [`lru`] - Size-bounded LRU with eviction callbacks
//! - [`singleflight`] - Request-coalescing flight gate
//! - [`ring`] - Consistent-hash ring with virtual nodes
//! - [`group`] - Cache namespaces, loader port, registry
//! - [`peers`] - Peer picker/client capability traits
//! - [`http`] - HTTP cluster binding (server, picker, peer client)
//! - [`wire`] - Peer RPC wire messages
//! - [`error`] - Error types

pub mod byteview;
mod cache;
pub mod error;
pub mod group;
pub mod http;
pub mod lru;
pub mod peers;
pub mod ring;
pub mod singleflight;
pub mod wire;

// Re-export commonly used types
pub use byteview::ByteView;
pub use error::{Error, Result};
pub use group::{FnLoader, Group, Loader, Registry, StatsSnapshot};
pub use http::{HttpPeer, HttpPool};
pub use peers::{PeerClient, PeerPicker};
pub use ring::HashRing;
pub use singleflight::FlightGroup;
