//! Typed client for the local generation backend.
//!
//! Three endpoints are consumed:
//!
//! | Call            | Endpoint              | Reply                              |
//! |-----------------|-----------------------|------------------------------------|
//! | `generate`      | `POST {base}/api/generate` | `{response}`                  |
//! | `version`       | `GET {base}/api/version`   | `{version}`                   |
//! | `list_models`   | `GET {base}/api/tags`      | `{models: [{name}, ...]}`     |
//!
//! The client owns the timeout and error-mapping policy for outbound calls.
//! Non-2xx replies become [`ClientError::RequestFailed`] carrying the
//! backend's `error` field when present, else the raw body text. Nothing is
//! retried here; retries are the caller's decision.
//!
//! The orchestrator and health monitor never hold a client directly: they
//! go through a [`BackendConnector`] so the server URL can change between
//! calls and tests can substitute an in-process backend.

pub mod error;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

pub use error::{ClientError, ClientResult};
pub use types::GenerationRequest;

use types::{ErrorBody, GenerateResponse, TagsResponse, VersionResponse};

/// Default timeout for generation and model-listing calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Default timeout for the reachability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Parse a user-supplied backend base URL.
///
/// Surrounding whitespace is ignored and a bare `host:port` gets an
/// `http://` scheme. Empty input, unparseable input, and URLs that cannot
/// carry a path are all rejected as invalid configuration.
pub fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::invalid_url(raw));
    }

    let normalized = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&normalized).map_err(|_| ClientError::invalid_url(raw))?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ClientError::invalid_url(raw));
    }
    Ok(url)
}

/// Pull a human-readable message out of a failed response body.
pub fn extract_error_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "Unknown error".to_string()
    } else {
        text
    }
}

/// Operations the orchestrator and health monitor need from a backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one non-streaming generation; returns the trimmed response text.
    async fn generate(&self, request: &GenerationRequest) -> ClientResult<String>;

    /// Backend version string; doubles as the reachability probe.
    async fn version(&self) -> ClientResult<String>;

    /// Installed model names, sorted ascending.
    async fn list_models(&self) -> ClientResult<Vec<String>>;
}

/// Builds a backend handle from a server URL string.
pub trait BackendConnector: Send + Sync {
    fn connect(&self, server_url: &str) -> ClientResult<Arc<dyn GenerationBackend>>;
}

/// HTTP client for an Ollama-compatible backend.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    http: reqwest::Client,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_http(base_url, reqwest::Client::new())
    }

    /// Reuse an existing connection pool.
    pub fn with_http(base_url: Url, http: reqwest::Client) -> Self {
        Self {
            base_url,
            http,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Parse `raw` with [`parse_base_url`] and build a client for it.
    pub fn from_url_str(raw: &str) -> ClientResult<Self> {
        parse_base_url(raw).map(Self::new)
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, probe_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/api/{name}`, appended to whatever path the base already has.
    fn endpoint(&self, name: &str) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::invalid_url(self.base_url.as_str()))?
            .pop_if_empty()
            .extend(["api", name]);
        Ok(url)
    }

    async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let message = extract_error_message(&body);
        debug!(status = status.as_u16(), %message, "backend rejected request");
        Err(ClientError::rejected(status.as_u16(), message))
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> ClientResult<String> {
        let url = self.endpoint("generate")?;
        debug!(model = %request.model, %url, "generate");

        let response = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(&request.to_body())
            .send()
            .await?;
        let decoded: GenerateResponse = Self::ensure_success(response).await?.json().await?;
        Ok(decoded.response.trim().to_string())
    }

    async fn version(&self) -> ClientResult<String> {
        let url = self.endpoint("version")?;
        let response = self
            .http
            .get(url)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        let decoded: VersionResponse = Self::ensure_success(response).await?.json().await?;
        Ok(decoded.version)
    }

    async fn list_models(&self) -> ClientResult<Vec<String>> {
        let url = self.endpoint("tags")?;
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let decoded: TagsResponse = Self::ensure_success(response).await?.json().await?;
        let mut names: Vec<String> = decoded.models.into_iter().map(|m| m.name).collect();
        names.sort();
        Ok(names)
    }
}

/// Connector producing [`OllamaClient`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct OllamaConnector {
    http: reqwest::Client,
    request_timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaConnector {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, probe_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.probe_timeout = probe_timeout;
        self
    }
}

impl Default for OllamaConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendConnector for OllamaConnector {
    fn connect(&self, server_url: &str) -> ClientResult<Arc<dyn GenerationBackend>> {
        let base = parse_base_url(server_url)?;
        let client = OllamaClient::with_http(base, self.http.clone())
            .with_timeouts(self.request_timeout, self.probe_timeout);
        Ok(Arc::new(client))
    }
}
