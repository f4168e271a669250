//! HTTP peer client
//!
//! One [`HttpPeer`] per remote node, addressing
//! `<peer base URL><base path><group>/<key>` with percent-encoded segments.
//! Transport failures and non-2xx statuses surface as
//! [`Error::PeerFetch`], decode failures as [`Error::Protocol`]; the group
//! layer treats both as recoverable and falls back to its loader.

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;
use tracing::debug;

use crate::error::{Error, Result};
use crate::peers::PeerClient;
use crate::wire::FetchResponse;

/// Client half of the peer protocol for a single remote node.
pub struct HttpPeer {
    /// Peer address including the base path, e.g. `http://host:port/_meshcache/`
    base_url: String,
    http: reqwest::Client,
}

impl HttpPeer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    fn peer_error(&self, reason: impl Into<String>) -> Error {
        Error::PeerFetch {
            peer: self.base_url.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeer {
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key),
        );
        debug!(%url, "fetching from peer");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.peer_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.peer_error(format!("unexpected status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.peer_error(format!("reading response body: {}", e)))?;

        let decoded =
            FetchResponse::decode(body).map_err(|e| Error::Protocol(e.to_string()))?;
        Ok(Bytes::from(decoded.value))
    }
}

// =============================================================================
// Tests
// =============================================================================
