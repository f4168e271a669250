//! HTTP pool: server half of the peer protocol plus owner selection
//!
//! One [`HttpPool`] per node. It owns the consistent-hash ring over the
//! cluster's peer addresses and a client per remote peer, and serves this
//! node's share of the keyspace at `GET <base path><group>/<key>`.
//!
//! `set_peers` replaces the route table wholesale under a write lock while
//! `pick_peer` reads it, so membership can change while reads are in flight.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use prost::Message;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::group::Registry;
use crate::http::HttpPeer;
use crate::peers::{PeerClient, PeerPicker};
use crate::ring::{HashRing, DEFAULT_REPLICAS};
use crate::wire::{FetchResponse, DEFAULT_BASE_PATH};

struct RouteTable {
    ring: HashRing,
    clients: HashMap<String, Arc<HttpPeer>>,
}

/// HTTP cluster binding for one node.
pub struct HttpPool {
    /// This node's base URL, e.g. `http://10.0.0.1:8001`. Must appear
    /// verbatim in every node's peer set or ownership will disagree.
    self_addr: String,
    base_path: String,
    registry: Arc<Registry>,
    routes: RwLock<RouteTable>,
}

impl HttpPool {
    /// Create a pool serving groups from the process-wide registry.
    pub fn new(self_addr: impl Into<String>) -> Arc<HttpPool> {
        Self::with_registry(self_addr, Registry::global())
    }

    /// Create a pool serving groups from a caller-scoped registry.
    pub fn with_registry(self_addr: impl Into<String>, registry: Arc<Registry>) -> Arc<HttpPool> {
        Arc::new(HttpPool {
            self_addr: self_addr.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            registry,
            routes: RwLock::new(RouteTable {
                ring: HashRing::new(DEFAULT_REPLICAS, None),
                clients: HashMap::new(),
            }),
        })
    }

    /// This node's base URL.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Replace the cluster membership. The peer list must include this
    /// node's own address and be identical on every node.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = HashRing::new(DEFAULT_REPLICAS, None);
        let mut clients = HashMap::new();
        for peer in peers {
            let peer = peer.into();
            ring.add([peer.as_str()]);
            if peer != self.self_addr {
                let base_url = format!("{}{}", peer, self.base_path);
                clients.insert(peer, Arc::new(HttpPeer::new(base_url)));
            }
        }

        let peer_count = clients.len();
        *self.routes.write() = RouteTable { ring, clients };
        info!(node = %self.self_addr, peers = peer_count, "peer set updated");
    }

    /// Bind this node's address and serve peer traffic until the task is
    /// dropped or accept fails.
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let addr = self.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Io(format!("bind {}: {}", addr, e)))?;
        self.serve_on(listener).await
    }

    /// Serve peer traffic on a pre-bound listener (tests bind port 0 first).
    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        info!(node = %self.self_addr, "cache server listening");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| Error::Io(format!("accept: {}", e)))?;
            let io = TokioIo::new(stream);

            let pool = Arc::clone(&self);
            tokio::spawn(async move {
                let node = pool.self_addr.clone();
                let service = service_fn(move |req| {
                    let pool = Arc::clone(&pool);
                    async move { Ok::<_, Infallible>(pool.handle(req).await) }
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(node = %node, "connection error: {}", e);
                }
            });
        }
    }

    fn listen_addr(&self) -> Result<SocketAddr> {
        let host_port = self
            .self_addr
            .strip_prefix("http://")
            .unwrap_or(&self.self_addr);
        host_port.parse().map_err(|e| {
            Error::Config(format!("invalid node address '{}': {}", self.self_addr, e))
        })
    }

    async fn handle(&self, req: Request<hyper::body::Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        debug!(node = %self.self_addr, method = %req.method(), %path, "request");

        if req.method() != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "GET only");
        }

        let (group_name, key) = match self.parse_path(&path) {
            Some(parts) => parts,
            None => return text_response(StatusCode::BAD_REQUEST, "bad request"),
        };

        let group = match self.registry.get(&group_name) {
            Some(group) => group,
            None => return text_response(StatusCode::NOT_FOUND, "no such group"),
        };

        match group.get(&key).await {
            Ok(view) => {
                let body = FetchResponse {
                    value: view.to_vec(),
                }
                .encode_to_vec();
                Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", "application/octet-stream")
                    .body(Full::new(Bytes::from(body)))
                    .unwrap()
            }
            Err(err) => text_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        }
    }

    /// Split `<base path><group>/<key>` into decoded group and key.
    fn parse_path(&self, path: &str) -> Option<(String, String)> {
        let rest = path.strip_prefix(self.base_path.as_str())?;
        let (group, key) = rest.split_once('/')?;
        if group.is_empty() || key.is_empty() {
            return None;
        }
        let group = urlencoding::decode(group).ok()?.into_owned();
        let key = urlencoding::decode(key).ok()?.into_owned();
        Some((group, key))
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerClient>> {
        let routes = self.routes.read();
        let owner = routes.ring.get(key)?;
        if owner == self.self_addr {
            return None;
        }
        debug!(node = %self.self_addr, key, owner, "picked remote owner");
        let client = routes.clients.get(owner)?;
        Some(Arc::clone(client) as Arc<dyn PeerClient>)
    }
}

fn text_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap()
}

// =============================================================================
// Tests
// =============================================================================
