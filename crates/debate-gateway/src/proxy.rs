//! Backend proxy for `/api/*`.
//!
//! Forwards method and body verbatim with only `content-type` and `accept`
//! carried over. The backend's status, content type, and body are relayed
//! unchanged. Nothing is retried.
//!
//! An unusable backend base URL does not stop the gateway from serving; it
//! turns every proxied request into a 400.

use std::time::Duration;

use debate_coordination::client::{parse_base_url, ClientError};
use reqwest::{Method, Url};
use tracing::{debug, warn};

use crate::error::GatewayResult;
use crate::framer::ParsedRequest;
use crate::response::{HttpResponse, APPLICATION_JSON};

const FORWARDED_HEADERS: [&str; 2] = ["content-type", "accept"];

#[derive(Debug, Clone)]
pub struct BackendProxy {
    backend_url: String,
    base: Result<Url, ClientError>,
    http: reqwest::Client,
}

impl BackendProxy {
    /// Fails only when the outbound HTTP client cannot be built.
    pub fn new(backend_url: &str, timeout: Duration) -> GatewayResult<Self> {
        let base = parse_base_url(backend_url);
        if let Err(e) = &base {
            warn!(error = %e, "backend URL unusable, proxied requests will be rejected");
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            backend_url: backend_url.to_string(),
            base,
            http,
        })
    }

    /// The backend URL as configured.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base.as_ref().ok()
    }

    /// Backend URL for `path`: the base path with `path` appended, query kept.
    pub fn resolve(&self, path: &str) -> Option<Url> {
        let base = self.base_url()?;
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };
        if !path.starts_with('/') {
            return None;
        }

        let mut url = base.clone();
        url.set_path(&format!("{}{path}", base.path().trim_end_matches('/')));
        url.set_query(query);
        url.set_fragment(None);
        Some(url)
    }

    pub async fn forward(&self, request: &ParsedRequest) -> HttpResponse {
        let Some(url) = self.resolve(&request.path) else {
            return HttpResponse::json_error(400, "Invalid URL");
        };
        let Ok(method) = Method::from_bytes(request.method.as_bytes()) else {
            return HttpResponse::json_error(400, "Invalid method");
        };

        debug!(%method, %url, "proxying to backend");
        let mut outbound = self.http.request(method, url);
        for name in FORWARDED_HEADERS {
            if let Some(value) = request.header(name) {
                outbound = outbound.header(name, value);
            }
        }
        if !request.body.is_empty() {
            outbound = outbound.body(request.body.clone());
        }

        match self.relay(outbound).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, path = %request.path, "backend proxy failed");
                HttpResponse::json_error(502, &sanitize(&err.to_string()))
            }
        }
    }

    async fn relay(&self, outbound: reqwest::RequestBuilder) -> Result<HttpResponse, reqwest::Error> {
        let response = outbound.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(APPLICATION_JSON)
            .to_string();
        let body = response.bytes().await?;
        Ok(HttpResponse::new(status, content_type, body.to_vec()))
    }
}

/// Swap double quotes for single quotes so the message reads cleanly once JSON-escaped.
fn sanitize(message: &str) -> String {
    message.replace('"', "'")
}
