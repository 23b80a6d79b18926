//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::framer::DEFAULT_MAX_REQUEST_BYTES;

/// Everything the gateway needs, passed into [`crate::server::Gateway::new`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Interface to bind. Loopback only in practice.
    pub bind_host: String,
    /// Tried first; an OS-assigned port is used if it is already taken.
    pub preferred_port: u16,
    /// Base URL of the generation backend that `/api/*` is forwarded to.
    pub backend_url: String,
    /// HTML served at `/`; a placeholder page is served when unset or unreadable.
    pub homepage_path: Option<PathBuf>,
    pub proxy_timeout: Duration,
    pub health_timeout: Duration,
    /// A connection that sends nothing for this long is dropped unanswered.
    pub read_timeout: Duration,
    pub max_request_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: std::env::var("DEBATE_GATEWAY_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            preferred_port: std::env::var("DEBATE_GATEWAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            backend_url: std::env::var("DEBATE_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:11434".into()),
            homepage_path: std::env::var("DEBATE_HOMEPAGE").ok().map(PathBuf::from),
            proxy_timeout: Duration::from_secs(60),
            health_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(30),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl GatewayConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.preferred_port = port;
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_homepage(mut self, path: impl Into<PathBuf>) -> Self {
        self.homepage_path = Some(path.into());
        self
    }
}
