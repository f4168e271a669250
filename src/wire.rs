//! Peer RPC wire messages
//!
//! Protobuf-encoded with fixed field tags; both sides of the cluster must
//! agree on the tags, so treat them as frozen.

use prost::Message;

/// URL prefix for peer traffic.
pub const DEFAULT_BASE_PATH: &str = "/_meshcache/";

/// A fetch addressed to the owner of a key.
///
/// Carried in the request URL (`<base>/<group>/<key>`); the message type
/// exists so non-URL transports can reuse the schema.
#[derive(Clone, PartialEq, Message)]
pub struct FetchRequest {
    #[prost(string, tag = "1")]
    pub group: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

/// The owner's reply: the raw cached bytes.
#[derive(Clone, PartialEq, Message)]
pub struct FetchResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

// =============================================================================
// Tests
// =============================================================================
