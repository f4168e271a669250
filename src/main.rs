//! meshcache demo node
//!
//! Runs one cache node: the peer HTTP server, the consistent-hash peer set,
//! and a demo "scores" namespace loaded from a built-in table. Point several
//! instances at the same `--peers` list to form a cluster:
//!
//! ```text
//! meshcache --addr http://127.0.0.1:8001
//! meshcache --addr http://127.0.0.1:8002
//! meshcache --addr http://127.0.0.1:8003 --api-addr 127.0.0.1:9999
//! ```

use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meshcache::error::{Error, Result};
use meshcache::{FnLoader, Group, HttpPool};

// =============================================================================
// CLI Arguments
// =============================================================================

/// meshcache - distributed read-through in-memory cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// This node's base URL; must appear in the peer list
    #[arg(long, env = "MESHCACHE_ADDR", default_value = "http://127.0.0.1:8001")]
    addr: String,

    /// Base URLs of every cluster member, self included
    #[arg(
        long,
        env = "MESHCACHE_PEERS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:8001,http://127.0.0.1:8002,http://127.0.0.1:8003"
    )]
    peers: Vec<String>,

    /// Also serve the front-end API (`GET /api?key=...`) on this address
    #[arg(long, env = "MESHCACHE_API_ADDR")]
    api_addr: Option<String>,

    /// Local cache capacity in bytes per group
    #[arg(long, env = "MESHCACHE_CACHE_BYTES", default_value = "2048")]
    cache_bytes: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting meshcache node");
    info!("  Node address: {}", args.addr);
    info!("  Peers: {}", args.peers.join(", "));
    info!("  Cache capacity: {} bytes", args.cache_bytes);

    if !args.peers.contains(&args.addr) {
        return Err(Error::Config(format!(
            "node address {} missing from peer list",
            args.addr
        )));
    }

    let group = create_scores_group(args.cache_bytes);

    let pool = HttpPool::new(&args.addr);
    pool.set_peers(args.peers.iter().map(String::as_str));
    group.register_peers(pool.clone());

    if let Some(api_addr) = args.api_addr.clone() {
        let api_group = group.clone();
        tokio::spawn(async move {
            if let Err(e) = run_api_server(&api_addr, api_group).await {
                error!("API server error: {}", e);
            }
        });
    }

    pool.serve().await
}

/// Demo namespace backed by a static score table, the data source the
/// loader consults on a cluster-wide miss.
fn create_scores_group(cache_bytes: u64) -> Group {
    const SCORES: [(&str, &str); 3] = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")];

    let loader = FnLoader::new(|key: &str| {
        debug!(key, "loading from score table");
        SCORES
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, score)| Bytes::from_static(score.as_bytes()))
            .ok_or_else(|| Error::NotFound(key.to_string()))
    });

    Group::new("scores", cache_bytes, Arc::new(loader))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Front-End API Server
// =============================================================================

/// Serve `GET /api?key=<key>` with the raw cached bytes. This is the
/// embedder-facing surface; peers never talk to it.
async fn run_api_server(addr: &str, group: Group) -> Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn api_handler(
        req: Request<hyper::body::Incoming>,
        group: Group,
    ) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
        fn text(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
            Response::builder()
                .status(status)
                .body(Full::new(Bytes::from(message.to_string())))
                .unwrap()
        }

        if req.uri().path() != "/api" {
            return Ok(text(StatusCode::NOT_FOUND, "not found"));
        }

        let key = req
            .uri()
            .query()
            .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("key=")))
            .and_then(|v| urlencoding::decode(v).ok());
        let key = match key {
            Some(key) if !key.is_empty() => key.into_owned(),
            _ => return Ok(text(StatusCode::BAD_REQUEST, "missing key parameter")),
        };

        let response = match group.get(&key).await {
            Ok(view) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/octet-stream")
                .body(Full::new(Bytes::from(view.to_vec())))
                .unwrap(),
            Err(err) => text(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid API server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Io(format!("bind API server: {}", e)))?;

    info!("API server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Io(format!("API server accept: {}", e)))?;

        let io = TokioIo::new(stream);
        let group = group.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| api_handler(req, group.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::error!("API server connection error: {}", e);
            }
        });
    }
}
