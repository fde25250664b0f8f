//! The HTTP server: socket accept loop, rate limiting, and the background
//! session-expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use tessera_mcp_server::{McpProtocolHandler, McpServer, Transport};

use crate::config::ServerConfig;
use crate::endpoint::{full_body, BoxedBody, McpEndpoint};
use crate::rate_limit::RateLimiter;
use crate::streams::StreamManager;
use crate::Result;

/// HTTP transport wrapping one protocol handler.
pub struct HttpMcpServer {
    config: Arc<ServerConfig>,
    protocol: Arc<McpProtocolHandler>,
    endpoint: McpEndpoint,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpMcpServer {
    pub fn new(protocol: Arc<McpProtocolHandler>, config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let streams = Arc::new(StreamManager::new());

        // Evicted or terminated sessions lose their GET stream, and
        // server-initiated notifications outside a request scope flow to
        // the stream if one is open.
        {
            let streams = Arc::clone(&streams);
            protocol.on_session_evict(move |session_id| streams.close(session_id));
        }
        {
            let streams = Arc::clone(&streams);
            protocol.set_session_broadcast(move |session_id, message| {
                if !streams.push(session_id, message) {
                    debug!(session_id, "dropping notification, no open stream");
                }
            });
        }

        let endpoint = McpEndpoint::new(
            Arc::clone(&config),
            Arc::clone(&protocol),
            Arc::clone(&streams),
        );
        let limiter = config
            .rate_limit
            .map(|limit| Arc::new(RateLimiter::new(limit)));

        Self {
            config,
            protocol,
            endpoint,
            limiter,
        }
    }

    /// Serve until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        self.spawn_session_sweeper();

        let listener = TcpListener::bind(&self.config.bind_address).await?;
        info!("HTTP MCP server listening on {}", self.config.bind_address);
        info!("MCP endpoint available at {}", self.config.mcp_path);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!(peer = %peer_addr, "new connection");

            let endpoint = self.endpoint.clone();
            let limiter = self.limiter.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let endpoint = endpoint.clone();
                    let limiter = limiter.clone();
                    async move {
                        if let Some(limiter) = &limiter {
                            if let Err(retry_after) = limiter.try_acquire() {
                                return Ok::<_, std::convert::Infallible>(rate_limited(
                                    retry_after,
                                ));
                            }
                        }
                        Ok(endpoint.handle(req).await)
                    }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let text = err.to_string();
                    if text.contains("connection closed") {
                        debug!("client disconnected: {}", err);
                    } else {
                        error!("error serving connection: {}", err);
                    }
                }
            });
        }
    }

    /// Sweep idle sessions once a minute.
    fn spawn_session_sweeper(&self) {
        let protocol = Arc::clone(&self.protocol);
        let expiry = self.config.session_expiry;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                protocol.cleanup_expired_sessions(expiry);
            }
        });
    }
}

fn rate_limited(retry_after: u64) -> Response<BoxedBody> {
    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("Retry-After", retry_after.to_string())
        .body(full_body(
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32600,"message":"Rate limit exceeded"}}"#,
        ))
        .unwrap()
}

/// Run a built server on the transport the environment selects:
/// stdio when `MCP_TRANSPORT=stdio` / `MCP_STDIO=1` / `USE_STDIO=1`,
/// HTTP otherwise.
pub async fn run(server: &McpServer, config: ServerConfig) -> Result<()> {
    match Transport::from_env() {
        Transport::Stdio => {
            info!("serving on stdio");
            server.run_stdio().await?;
            Ok(())
        }
        Transport::Http => HttpMcpServer::new(server.protocol(), config).run().await,
    }
}
