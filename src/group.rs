//! Cache namespaces and the read path
//!
//! A [`Group`] is a named cache scope: one bounded local cache, one loader,
//! and optionally one peer picker. A read resolves in order:
//!
//! ```text
//! Group::get(key)
//!   ├─ local cache hit ──────────────────────────────▶ value
//!   └─ miss → single-flight gate (one load per key)
//!        ├─ ring says a remote peer owns the key ──▶ peer RPC
//!        │    └─ peer failed → fall back below
//!        └─ loader → populate local cache ─────────▶ value
//! ```
//!
//! A value fetched from a peer is deliberately **not** written to the local
//! cache: the owner already caches it, and duplicating it here would double
//! cluster memory and leave stale copies outside the owner's control.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::byteview::ByteView;
use crate::cache::MainCache;
use crate::error::{Error, Result};
use crate::peers::{PeerClient, PeerPicker};
use crate::singleflight::FlightGroup;

// =============================================================================
// Loader Port
// =============================================================================

/// User-supplied data source, invoked on a local cache miss.
///
/// Called at most once per key per concurrent wave on this node; blocking
/// I/O is expected, implementations must be callable from any worker.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Fetch the authoritative bytes for `key`.
    async fn load(&self, key: &str) -> Result<Bytes>;
}

/// Adapter turning a plain closure into a [`Loader`].
pub struct FnLoader<F> {
    f: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&str) -> Result<Bytes> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Loader for FnLoader<F>
where
    F: Fn(&str) -> Result<Bytes> + Send + Sync,
{
    async fn load(&self, key: &str) -> Result<Bytes> {
        (self.f)(key)
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Default)]
struct GroupStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    local_loads: AtomicU64,
    peer_fetches: AtomicU64,
    peer_failures: AtomicU64,
}

impl GroupStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            peer_fetches: self.peer_fetches.load(Ordering::Relaxed),
            peer_failures: self.peer_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a group's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Reads served from the local cache
    pub cache_hits: u64,
    /// Reads that entered the load path
    pub cache_misses: u64,
    /// Loader invocations
    pub local_loads: u64,
    /// Values served by a remote owner
    pub peer_fetches: u64,
    /// Peer fetches that fell back to the loader
    pub peer_failures: u64,
}

// =============================================================================
// Group
// =============================================================================

struct GroupInner {
    name: String,
    loader: Arc<dyn Loader>,
    cache: MainCache,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: FlightGroup<Result<ByteView>>,
    stats: GroupStats,
}

/// A named cache namespace. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Group {
    /// Create a group and register it in the process-wide registry.
    pub fn new(name: impl Into<String>, cache_bytes: u64, loader: Arc<dyn Loader>) -> Group {
        Registry::global().new_group(name, cache_bytes, loader)
    }

    fn build(name: String, cache_bytes: u64, loader: Arc<dyn Loader>) -> Group {
        Group {
            inner: Arc::new(GroupInner {
                name,
                loader,
                cache: MainCache::new(cache_bytes),
                peers: OnceLock::new(),
                flight: FlightGroup::new(),
                stats: GroupStats::default(),
            }),
        }
    }

    /// The namespace name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Install the peer picker. May be called once per group.
    ///
    /// # Panics
    ///
    /// Panics on a second call; wiring peers twice is a programmer error.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.inner.peers.set(picker).is_err() {
            panic!("register_peers called twice for group '{}'", self.inner.name);
        }
    }

    /// Read `key`, trying the local cache, then the owning peer, then the
    /// loader. Concurrent misses on the same key share one load.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        if let Some(view) = self.inner.cache.get(key) {
            self.inner.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(group = %self.inner.name, key, "cache hit");
            return Ok(view);
        }
        self.inner.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        self.load(key).await
    }

    /// Counter snapshot for this group.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Entries currently held in the local cache.
    pub fn cached_entries(&self) -> usize {
        self.inner.cache.len()
    }

    /// Bytes currently held in the local cache.
    pub fn cached_bytes(&self) -> u64 {
        self.inner.cache.used_bytes()
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        let this = self.clone();
        let owned = key.to_string();
        self.inner
            .flight
            .run(key, async move { this.load_inner(&owned).await })
            .await
    }

    /// One uncoalesced load: peer first when a remote owner exists, loader
    /// otherwise or on any peer failure. Runs with no locks held.
    async fn load_inner(&self, key: &str) -> Result<ByteView> {
        if let Some(picker) = self.inner.peers.get() {
            if let Some(peer) = picker.pick_peer(key) {
                match self.fetch_from_peer(peer.as_ref(), key).await {
                    Ok(view) => {
                        self.inner.stats.peer_fetches.fetch_add(1, Ordering::Relaxed);
                        return Ok(view);
                    }
                    Err(err) => {
                        self.inner.stats.peer_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            group = %self.inner.name, key, %err,
                            "peer fetch failed, falling back to local load"
                        );
                    }
                }
            }
        }
        self.load_locally(key).await
    }

    async fn fetch_from_peer(&self, peer: &dyn PeerClient, key: &str) -> Result<ByteView> {
        let bytes = peer.fetch(&self.inner.name, key).await?;
        // Not written to the local cache: the owner's copy is authoritative.
        Ok(ByteView::new(bytes))
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.inner.loader.load(key).await?;
        let view = ByteView::new(bytes);
        self.inner.cache.add(key, view.clone());
        self.inner.stats.local_loads.fetch_add(1, Ordering::Relaxed);
        debug!(group = %self.inner.name, key, bytes = view.len(), "loaded and cached locally");
        Ok(view)
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.inner.name)
            .field("cached_entries", &self.inner.cache.len())
            .finish()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Maps namespace names to groups.
///
/// Most embedders use the process-wide [`Registry::global`]; tests and
/// multi-tenant hosts can scope their own instance. Lookups take the read
/// lock and sit on the request hot path; registration takes the write lock.
pub struct Registry {
    groups: RwLock<HashMap<String, Group>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));
        Arc::clone(&GLOBAL)
    }

    /// Create a group registered in this registry. Re-registering a name
    /// replaces the previous group.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        cache_bytes: u64,
        loader: Arc<dyn Loader>,
    ) -> Group {
        let name = name.into();
        let group = Group::build(name.clone(), cache_bytes, loader);
        self.groups.write().insert(name, group.clone());
        group
    }

    /// Look up a group by name.
    pub fn get(&self, name: &str) -> Option<Group> {
        self.groups.read().get(name).cloned()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn score_loader(calls: Arc<AtomicUsize>) -> Arc<dyn Loader> {
        Arc::new(FnLoader::new(move |key: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            match key {
                "Tom" => Ok(Bytes::from_static(b"630")),
                "Jack" => Ok(Bytes::from_static(b"589")),
                "Sam" => Ok(Bytes::from_static(b"567")),
                _ => Err(Error::NotFound(key.to_string())),
            }
        }))
    }

    #[tokio::test]
    async fn test_get_empty_key_is_invalid() {
        let registry = Registry::new();
        let group = registry.new_group("scores", 2048, score_loader(Arc::default()));
        assert_eq!(group.get("").await, Err(Error::EmptyKey));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_loader() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let group = registry.new_group("scores", 2048, score_loader(calls.clone()));

        let first = group.get("Tom").await.unwrap();
        assert_eq!(first.to_string_lossy(), "630");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = group.get("Tom").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "cache hit must not reload");

        let stats = group.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[tokio::test]
    async fn test_unknown_key_propagates_loader_error() {
        let registry = Registry::new();
        let group = registry.new_group("scores", 2048, score_loader(Arc::default()));

        assert_eq!(
            group.get("unknown").await,
            Err(Error::NotFound("unknown".to_string()))
        );
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_load() {
        struct SlowLoader {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl Loader for SlowLoader {
            async fn load(&self, key: &str) -> Result<Bytes> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                match key {
                    "Tom" => Ok(Bytes::from_static(b"630")),
                    _ => Err(Error::NotFound(key.to_string())),
                }
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let group = registry.new_group(
            "scores",
            2048,
            Arc::new(SlowLoader {
                calls: calls.clone(),
            }),
        );

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let group = group.clone();
                tokio::spawn(async move { group.get("Tom").await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().to_string_lossy(), "630");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "loader must run once");
    }

    #[tokio::test]
    async fn test_peer_fetch_serves_without_local_population() {
        struct FixedPeer;

        #[async_trait]
        impl PeerClient for FixedPeer {
            async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
                assert_eq!(group, "scores");
                assert_eq!(key, "Tom");
                Ok(Bytes::from_static(b"630"))
            }
        }

        struct AlwaysRemote;

        impl PeerPicker for AlwaysRemote {
            fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerClient>> {
                Some(Arc::new(FixedPeer))
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let group = registry.new_group("scores", 2048, score_loader(calls.clone()));
        group.register_peers(Arc::new(AlwaysRemote));

        let value = group.get("Tom").await.unwrap();
        assert_eq!(value.to_string_lossy(), "630");
        assert_eq!(calls.load(Ordering::SeqCst), 0, "loader must not run");
        assert_eq!(group.cached_entries(), 0, "peer values are not cached locally");
        assert_eq!(group.stats().peer_fetches, 1);
    }

    #[tokio::test]
    async fn test_peer_failure_falls_back_to_loader() {
        struct DeadPeer;

        #[async_trait]
        impl PeerClient for DeadPeer {
            async fn fetch(&self, _group: &str, _key: &str) -> Result<Bytes> {
                Err(Error::PeerFetch {
                    peer: "http://localhost:1".to_string(),
                    reason: "connection refused".to_string(),
                })
            }
        }

        struct AlwaysRemote;

        impl PeerPicker for AlwaysRemote {
            fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerClient>> {
                Some(Arc::new(DeadPeer))
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        let group = registry.new_group("scores", 2048, score_loader(calls.clone()));
        group.register_peers(Arc::new(AlwaysRemote));

        let value = group.get("Tom").await.unwrap();
        assert_eq!(value.to_string_lossy(), "630");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "fallback runs the loader");
        assert_eq!(group.cached_entries(), 1, "fallback populates the cache");

        let stats = group.stats();
        assert_eq!(stats.peer_failures, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[tokio::test]
    #[should_panic(expected = "register_peers called twice")]
    async fn test_register_peers_twice_panics() {
        struct NoPeers;

        impl PeerPicker for NoPeers {
            fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerClient>> {
                None
            }
        }

        let registry = Registry::new();
        let group = registry.new_group("scores", 2048, score_loader(Arc::default()));
        group.register_peers(Arc::new(NoPeers));
        group.register_peers(Arc::new(NoPeers));
    }

    #[tokio::test]
    async fn test_global_registry_round_trip() {
        let group = Group::new("global-scores", 2048, score_loader(Arc::default()));
        let found = Registry::global()
            .get("global-scores")
            .expect("registered group");
        assert_eq!(found.name(), group.name());

        assert!(Registry::global().get("no-such-group").is_none());
    }

    #[tokio::test]
    async fn test_eviction_keeps_reads_correct() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = Registry::new();
        // Tiny cache: every entry costs key.len() + 3 bytes, cap fits one
        let group = registry.new_group("scores", 8, score_loader(calls.clone()));

        assert_eq!(group.get("Tom").await.unwrap().to_string_lossy(), "630");
        assert_eq!(group.get("Jack").await.unwrap().to_string_lossy(), "589");
        // Tom was evicted by Jack; reading it loads again
        assert_eq!(group.get("Tom").await.unwrap().to_string_lossy(), "630");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
