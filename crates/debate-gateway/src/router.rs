//! Request routing.
//!
//! | Method | Path                                 | Route      |
//! |--------|--------------------------------------|------------|
//! | GET    | `/`, `/Homepage.html`, `/Homepage`   | `Homepage` |
//! | GET    | `/health`                            | `Health`   |
//! | any    | `/api/...`                           | `Proxy`    |
//! | GET    | `/favicon.ico`                       | `Favicon`  |
//! | *      | anything else                        | `NotFound` |

use std::path::Path;
use std::sync::Arc;

use debate_coordination::health::SharedHealthMonitor;
use serde::Serialize;
use tracing::{debug, warn};

use crate::framer::ParsedRequest;
use crate::proxy::BackendProxy;
use crate::response::HttpResponse;

const PLACEHOLDER_HOMEPAGE: &str = "<h1>Missing Homepage.html</h1>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Homepage,
    Health,
    Proxy,
    Favicon,
    NotFound,
}

impl Route {
    /// Pure routing decision; the query string is ignored.
    pub fn resolve(method: &str, path: &str) -> Self {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let is_get = method == "GET";
        match path {
            "/" | "/Homepage.html" | "/Homepage" if is_get => Self::Homepage,
            "/health" if is_get => Self::Health,
            p if p.starts_with("/api/") => Self::Proxy,
            "/favicon.ico" if is_get => Self::Favicon,
            _ => Self::NotFound,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Dispatches framed requests to their handlers. Cheap to clone.
#[derive(Clone)]
pub struct Router {
    homepage: Arc<Vec<u8>>,
    proxy: BackendProxy,
    health: SharedHealthMonitor,
}

impl Router {
    pub fn new(homepage: Vec<u8>, proxy: BackendProxy, health: SharedHealthMonitor) -> Self {
        Self {
            homepage: Arc::new(homepage),
            proxy,
            health,
        }
    }

    /// Read the homepage from `path`, falling back to a placeholder page.
    pub async fn load_homepage(path: Option<&Path>) -> Vec<u8> {
        let Some(path) = path else {
            return PLACEHOLDER_HOMEPAGE.as_bytes().to_vec();
        };
        match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "homepage unreadable, serving placeholder");
                PLACEHOLDER_HOMEPAGE.as_bytes().to_vec()
            }
        }
    }

    pub async fn dispatch(&self, request: &ParsedRequest) -> HttpResponse {
        let route = Route::resolve(&request.method, &request.path);
        debug!(method = %request.method, path = %request.path, ?route, "dispatch");
        match route {
            Route::Homepage => HttpResponse::html(self.homepage.as_slice()),
            Route::Health => self.health_response().await,
            Route::Proxy => self.proxy.forward(request).await,
            Route::Favicon => HttpResponse::no_content(),
            Route::NotFound => HttpResponse::not_found(),
        }
    }

    /// Live version probe; always 200, reachability is in the body.
    async fn health_response(&self) -> HttpResponse {
        let outcome = self.health.check(self.proxy.backend_url()).await;
        HttpResponse::json(
            200,
            &HealthBody {
                ok: outcome.ok,
                error: if outcome.ok { None } else { outcome.error },
            },
        )
    }
}
