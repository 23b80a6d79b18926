//! Connection acceptor.
//!
//! Binds the preferred port, falling back once to an OS-assigned port when
//! the preferred one is already in use. Each accepted connection is framed
//! and answered on its own task so a slow client never blocks the accept
//! loop. One request per connection; a connection that goes quiet before
//! completing its request is dropped after the configured read timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use debate_coordination::client::{BackendConnector, OllamaConnector};
use debate_coordination::health::{HealthMonitor, SharedHealthMonitor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::framer::{FrameStatus, RequestFramer};
use crate::proxy::BackendProxy;
use crate::response::HttpResponse;
use crate::router::Router;

const READ_CHUNK: usize = 64 * 1024;
const HOMEPAGE_PATH: &str = "/Homepage.html";
const LINGER: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
struct ConnectionLimits {
    max_request_bytes: usize,
    read_timeout: Duration,
}

struct Listening {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Loopback HTTP gateway: homepage, health, and backend proxy.
pub struct Gateway {
    config: GatewayConfig,
    health: SharedHealthMonitor,
    url: watch::Sender<Option<String>>,
    listening: Mutex<Option<Listening>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, health: SharedHealthMonitor) -> Self {
        let (url, _) = watch::channel(None);
        Self {
            config,
            health,
            url,
            listening: Mutex::new(None),
        }
    }

    /// Gateway with its own health monitor probing the configured backend.
    pub fn from_config(config: GatewayConfig) -> Self {
        let connector: Arc<dyn BackendConnector> = Arc::new(
            OllamaConnector::new().with_timeouts(config.proxy_timeout, config.health_timeout),
        );
        let health = HealthMonitor::new(connector).shared();
        Self::new(config, health)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn health(&self) -> &SharedHealthMonitor {
        &self.health
    }

    /// Bind and start accepting. Idempotent while running.
    ///
    /// On failure no base URL is published.
    pub async fn start(&self) -> GatewayResult<SocketAddr> {
        let mut listening = self.listening.lock().await;
        if let Some(current) = listening.as_ref() {
            return Ok(current.addr);
        }

        let result = self.bind_and_spawn().await;
        match result {
            Ok(started) => {
                let addr = started.addr;
                let base = base_url_for(addr);
                info!(%addr, url = %base, "gateway listening");
                self.url.send_replace(Some(base));
                *listening = Some(started);
                Ok(addr)
            }
            Err(e) => {
                warn!(error = %e, "gateway failed to start");
                self.url.send_replace(None);
                Err(e)
            }
        }
    }

    /// Close the listener and clear the published URL. A later `start` binds afresh.
    pub async fn stop(&self) {
        let Some(listening) = self.listening.lock().await.take() else {
            return;
        };
        listening.cancel.cancel();
        if let Err(e) = listening.task.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        self.url.send_replace(None);
        info!(addr = %listening.addr, "gateway stopped");
    }

    /// `http://localhost:<port>` while running.
    pub fn base_url(&self) -> Option<String> {
        self.url.borrow().clone()
    }

    /// Entry page for the presentation layer.
    pub fn homepage_url(&self) -> Option<String> {
        self.base_url().map(|base| format!("{base}{HOMEPAGE_PATH}"))
    }

    /// Notified whenever the published base URL changes.
    pub fn subscribe_url(&self) -> watch::Receiver<Option<String>> {
        self.url.subscribe()
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().await.as_ref().map(|l| l.addr)
    }

    async fn bind_and_spawn(&self) -> GatewayResult<Listening> {
        let proxy = BackendProxy::new(&self.config.backend_url, self.config.proxy_timeout)?;
        let listener = self.bind().await?;
        let addr = listener.local_addr()?;

        let homepage = Router::load_homepage(self.config.homepage_path.as_deref()).await;
        let router = Router::new(homepage, proxy, Arc::clone(&self.health));
        let cancel = CancellationToken::new();
        let limits = ConnectionLimits {
            max_request_bytes: self.config.max_request_bytes,
            read_timeout: self.config.read_timeout,
        };
        let task = tokio::spawn(accept_loop(listener, router, limits, cancel.clone()));

        Ok(Listening { addr, cancel, task })
    }

    async fn bind(&self) -> GatewayResult<TcpListener> {
        let host = self.config.bind_host.as_str();
        let port = self.config.preferred_port;
        match bind_to(host, port).await {
            Err(e) if e.is_addr_in_use() => {
                info!(port, "preferred port busy, falling back to an ephemeral port");
                bind_to(host, 0).await
            }
            result => result,
        }
    }
}

async fn bind_to(host: &str, port: u16) -> GatewayResult<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| GatewayError::bind(format!("{host}:{port}"), e))
}

fn base_url_for(addr: SocketAddr) -> String {
    format!("http://localhost:{}", addr.port())
}

async fn accept_loop(
    listener: TcpListener,
    router: Router,
    limits: ConnectionLimits,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let router = router.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, router, limits).await {
                            debug!(%peer, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }
    debug!("accept loop exited");
}

/// Frame one request, answer it, close.
async fn handle_connection(
    mut stream: TcpStream,
    router: Router,
    limits: ConnectionLimits,
) -> std::io::Result<()> {
    let mut framer = RequestFramer::new(limits.max_request_bytes);
    let mut chunk = vec![0u8; READ_CHUNK];

    let response = loop {
        let Ok(read) = tokio::time::timeout(limits.read_timeout, stream.read(&mut chunk)).await
        else {
            debug!(buffered = framer.buffered(), "connection idle, closing");
            return Ok(());
        };
        let n = read?;
        if n == 0 {
            debug!(buffered = framer.buffered(), "peer closed before a full request");
            return Ok(());
        }
        match framer.push(&chunk[..n]) {
            FrameStatus::Incomplete => continue,
            FrameStatus::Complete(request) => break router.dispatch(&request).await,
            FrameStatus::TooLarge => break HttpResponse::payload_too_large(),
            FrameStatus::Malformed => {
                debug!("malformed request, closing");
                return Ok(());
            }
        }
    };

    response.write_to(&mut stream).await?;
    stream.shutdown().await?;
    linger(&mut stream, &mut chunk).await;
    Ok(())
}

/// Read and discard until the peer closes, bounded by [`LINGER`].
///
/// Closing with unread input makes the kernel send RST, which can destroy
/// the response before the peer reads it.
async fn linger(stream: &mut TcpStream, scratch: &mut [u8]) {
    let drain = async {
        while let Ok(n) = stream.read(scratch).await {
            if n == 0 {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(LINGER, drain).await;
}
