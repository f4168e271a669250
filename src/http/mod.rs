//! HTTP cluster binding
//!
//! Binds the core to an HTTP request/response transport: [`HttpPool`] serves
//! this node's share of the keyspace and picks owners for outgoing reads;
//! [`HttpPeer`] is the client half used to fetch from a remote owner.

mod client;
mod pool;

pub use client::HttpPeer;
pub use pool::HttpPool;
