//! Backend reachability monitor.
//!
//! ```text
//!            refresh(url)                 2xx
//! Unknown ───────────────► probing ─────────────► Ok
//!    ▲                        │
//!    │                        └─ timeout / non-2xx / refused ─► Down
//!    │
//!    └── Issue: reserved for reachable-but-degraded; no probe produces it
//! ```
//!
//! A refresh or an inline check supersedes any probe still in flight. A
//! superseded probe finishes silently and never touches the status.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{BackendConnector, ClientError, GenerationBackend};
use crate::debate::ContextMode;
use crate::events::{DebateEvent, SharedEventBus};

/// Current backend reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No probe has completed yet.
    #[default]
    Unknown,
    /// The version probe answered 2xx.
    Ok,
    /// Reachable but degraded. Reserved for extension.
    Issue,
    /// The version probe failed.
    Down,
}

impl HealthStatus {
    /// Subheading shown above the debate: connectivity, context mode, URL.
    pub fn status_line(self, server_url: &str, context_mode: ContextMode) -> String {
        let state = match self {
            Self::Ok => "Backend OK",
            Self::Issue => "Backend issue",
            Self::Down => "Backend down",
            Self::Unknown => "Checking backend…",
        };
        format!("{state} • {} • {server_url}", context_mode.label())
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Ok => write!(f, "ok"),
            Self::Issue => write!(f, "issue"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Result of one reachability probe. Transient; only the derived status is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn status(&self) -> HealthStatus {
        if self.ok {
            HealthStatus::Ok
        } else {
            HealthStatus::Down
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            version: None,
            error: Some(error),
        }
    }
}

/// Issue one version call and classify the reply.
///
/// Any 2xx counts as reachable, even when the body is not a version object.
pub async fn probe(backend: &dyn GenerationBackend) -> ProbeOutcome {
    match backend.version().await {
        Ok(version) => ProbeOutcome {
            ok: true,
            version: Some(version),
            error: None,
        },
        Err(ClientError::Decode(_)) => ProbeOutcome {
            ok: true,
            version: None,
            error: None,
        },
        Err(ClientError::RequestFailed { status, .. }) => {
            ProbeOutcome::failed(format!("Backend returned HTTP {status}"))
        }
        Err(e) => ProbeOutcome::failed(e.to_string()),
    }
}

/// Shared reference to a HealthMonitor
pub type SharedHealthMonitor = Arc<HealthMonitor>;

#[derive(Default)]
struct InFlight {
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Owns the [`HealthStatus`] field; the only writer of it.
pub struct HealthMonitor {
    connector: Arc<dyn BackendConnector>,
    status: watch::Sender<HealthStatus>,
    in_flight: Mutex<InFlight>,
    events: Option<SharedEventBus>,
}

impl HealthMonitor {
    pub fn new(connector: Arc<dyn BackendConnector>) -> Self {
        let (status, _) = watch::channel(HealthStatus::Unknown);
        Self {
            connector,
            status,
            in_flight: Mutex::new(InFlight::default()),
            events: None,
        }
    }

    /// Announce status changes on `events`.
    pub fn with_events(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn shared(self) -> SharedHealthMonitor {
        Arc::new(self)
    }

    pub fn status(&self) -> HealthStatus {
        *self.status.borrow()
    }

    /// Observe every status transition.
    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.status.subscribe()
    }

    /// Cancel any in-flight probe and start a new one against `server_url`.
    ///
    /// Returns the probe task; awaiting it is optional.
    pub fn refresh(self: &Arc<Self>, server_url: &str) -> JoinHandle<()> {
        let token = CancellationToken::new();
        let generation = self.supersede(Some(token.clone()));

        let monitor = Arc::clone(self);
        let server_url = server_url.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(generation, "health probe superseded");
                }
                outcome = monitor.probe_url(&server_url) => {
                    monitor.apply(generation, outcome.status());
                }
            }
        })
    }

    /// Probe `server_url` inline and record the result.
    pub async fn check(&self, server_url: &str) -> ProbeOutcome {
        let generation = self.supersede(None);
        let outcome = self.probe_url(server_url).await;
        self.apply(generation, outcome.status());
        outcome
    }

    /// Cancel the probe in flight and claim the next generation.
    fn supersede(&self, token: Option<CancellationToken>) -> u64 {
        let mut in_flight = self.lock_in_flight();
        if let Some(previous) = std::mem::replace(&mut in_flight.cancel, token) {
            previous.cancel();
        }
        in_flight.generation += 1;
        in_flight.generation
    }

    async fn probe_url(&self, server_url: &str) -> ProbeOutcome {
        match self.connector.connect(server_url) {
            Ok(backend) => probe(backend.as_ref()).await,
            Err(e) => ProbeOutcome::failed(e.to_string()),
        }
    }

    fn apply(&self, generation: u64, status: HealthStatus) {
        let in_flight = self.lock_in_flight();
        if in_flight.generation != generation {
            debug!(generation, "dropping stale health probe result");
            return;
        }
        self.set_status(status);
    }

    fn set_status(&self, next: HealthStatus) {
        let mut previous = next;
        let changed = self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = *current;
            *current = next;
            true
        });

        if changed {
            info!(from = %previous, to = %next, "backend health changed");
            if let Some(events) = &self.events {
                events.publish(DebateEvent::HealthChanged {
                    from: previous,
                    to: next,
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, InFlight> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientResult, GenerationRequest};
    use crate::events::EventBus;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedBackend {
        reply: ClientResult<String>,
        delay: Duration,
    }

    #[async_trait]
    impl GenerationBackend for FixedBackend {
        async fn generate(&self, _request: &GenerationRequest) -> ClientResult<String> {
            unreachable!("health probes never generate")
        }

        async fn version(&self) -> ClientResult<String> {
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }

        async fn list_models(&self) -> ClientResult<Vec<String>> {
            Ok(vec![])
        }
    }

    /// `fast` URLs answer `Ok` immediately, `slow` URLs answer `Down` late.
    struct UrlConnector;

    impl BackendConnector for UrlConnector {
        fn connect(&self, server_url: &str) -> ClientResult<Arc<dyn GenerationBackend>> {
            let backend = match server_url {
                "fast" => FixedBackend {
                    reply: Ok("0.5.1".into()),
                    delay: Duration::ZERO,
                },
                "slow" => FixedBackend {
                    reply: Err(ClientError::transport("refused", false)),
                    delay: Duration::from_millis(200),
                },
                "rejecting" => FixedBackend {
                    reply: Err(ClientError::rejected(503, "loading")),
                    delay: Duration::ZERO,
                },
                "odd-body" => FixedBackend {
                    reply: Err(ClientError::Decode("missing field".into())),
                    delay: Duration::ZERO,
                },
                other => return Err(ClientError::invalid_url(other)),
            };
            Ok(Arc::new(backend))
        }
    }

    fn monitor() -> SharedHealthMonitor {
        HealthMonitor::new(Arc::new(UrlConnector)).shared()
    }

    #[tokio::test]
    async fn test_refresh_ok() {
        let monitor = monitor();
        assert_eq!(monitor.status(), HealthStatus::Unknown);
        monitor.refresh("fast").await.unwrap();
        assert_eq!(monitor.status(), HealthStatus::Ok);
    }

    #[tokio::test]
    async fn test_refresh_failure_marks_down() {
        let monitor = monitor();
        monitor.refresh("rejecting").await.unwrap();
        assert_eq!(monitor.status(), HealthStatus::Down);

        monitor.refresh("").await.unwrap();
        assert_eq!(monitor.status(), HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_any_2xx_counts_as_ok() {
        let monitor = monitor();
        monitor.refresh("odd-body").await.unwrap();
        assert_eq!(monitor.status(), HealthStatus::Ok);
    }

    #[tokio::test]
    async fn test_superseded_probe_is_silent() {
        let monitor = monitor();
        let slow = monitor.refresh("slow");
        let fast = monitor.refresh("fast");

        fast.await.unwrap();
        slow.await.unwrap();
        assert_eq!(monitor.status(), HealthStatus::Ok);
    }

    #[tokio::test]
    async fn test_check_supersedes_earlier_refresh() {
        let monitor = monitor();
        let slow = monitor.refresh("slow");

        let outcome = monitor.check("fast").await;
        assert!(outcome.ok);
        slow.await.unwrap();
        assert_eq!(monitor.status(), HealthStatus::Ok);
    }

    #[tokio::test]
    async fn test_check_reports_error_text() {
        let monitor = monitor();
        let outcome = monitor.check("rejecting").await;
        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("Backend returned HTTP 503"));
        assert_eq!(monitor.status(), HealthStatus::Down);
    }

    #[tokio::test]
    async fn test_transitions_are_published() {
        let events = EventBus::new().shared();
        let mut rx = events.subscribe();
        let monitor = HealthMonitor::new(Arc::new(UrlConnector))
            .with_events(events.clone())
            .shared();

        monitor.refresh("fast").await.unwrap();
        // Same status again: no second event.
        monitor.refresh("fast").await.unwrap();
        monitor.refresh("rejecting").await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            DebateEvent::HealthChanged {
                from: HealthStatus::Unknown,
                to: HealthStatus::Ok,
                timestamp: first.timestamp(),
            }
        );
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            DebateEvent::HealthChanged {
                from: HealthStatus::Ok,
                to: HealthStatus::Down,
                ..
            }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_status_line() {
        assert_eq!(
            HealthStatus::Ok.status_line("http://localhost:11434", ContextMode::Auto),
            "Backend OK • Auto context • http://localhost:11434"
        );
        assert!(HealthStatus::Unknown
            .status_line("x", ContextMode::Manual)
            .starts_with("Checking backend… • Manual context"));
    }
}
