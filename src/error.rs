//! Error types for meshcache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in meshcache.
///
/// Every variant carries owned, clonable data: one load outcome is shared
/// across all callers coalesced on the same key, so the error must be `Clone`.
/// Foreign errors (reqwest, prost, std::io) are converted to strings at the
/// boundary that observes them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Lookup with an empty key
    #[error("cache key must not be empty")]
    EmptyKey,

    /// Key absent at the data source
    #[error("key not found: {0}")]
    NotFound(String),

    /// Loader callback failed
    #[error("loader failed for key '{key}': {reason}")]
    Loader { key: String, reason: String },

    /// Remote peer fetch failed (connection, timeout, non-200)
    #[error("peer fetch from {peer} failed: {reason}")]
    PeerFetch { peer: String, reason: String },

    /// Malformed peer response body
    #[error("malformed peer response: {0}")]
    Protocol(String),

    /// I/O error (bind, accept)
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

// =============================================================================
// Tests
// =============================================================================
