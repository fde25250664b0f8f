//! HTTP server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Token-bucket settings for the optional request rate limit.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub requests_per_second: f64,
    /// Burst capacity.
    pub burst: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 100.0,
            burst: 200.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_address: SocketAddr,
    /// Path of the MCP endpoint.
    pub mcp_path: String,
    /// Path of the client reply channel for server-initiated requests.
    pub respond_path: String,
    /// Path of the liveness probe.
    pub health_path: String,
    /// Whether to stamp permissive CORS headers on every response.
    pub enable_cors: bool,
    /// POST bodies larger than this are rejected before parsing.
    pub max_body_size: usize,
    /// Sessions idle longer than this are swept by the background task.
    pub session_expiry: Duration,
    /// `None` disables rate limiting.
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // Infallible: literal address.
            bind_address: "127.0.0.1:8000".parse().unwrap(),
            mcp_path: "/mcp".to_string(),
            respond_path: "/mcp/respond".to_string(),
            health_path: "/health".to_string(),
            enable_cors: true,
            max_body_size: 10 * 1024 * 1024,
            session_expiry: Duration::from_secs(3600),
            rate_limit: Some(RateLimitConfig::default()),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn mcp_path(mut self, path: impl Into<String>) -> Self {
        self.mcp_path = path.into();
        self
    }

    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn session_expiry(mut self, expiry: Duration) -> Self {
        self.session_expiry = expiry;
        self
    }

    pub fn rate_limit(mut self, limit: Option<RateLimitConfig>) -> Self {
        self.rate_limit = limit;
        self
    }
}
