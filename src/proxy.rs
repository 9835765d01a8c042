//! DNS proxy orchestration.
//!
//! Binds the UDP socket, runs the receive loop, and spawns one forwarder
//! task per datagram. The loop owns each buffer only until dispatch: the
//! buffer moves into the forwarder task, which alone returns it to the
//! pool when it finishes, so the loop can never reuse storage that an
//! in-flight query still holds.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use crate::pool::{BufferPool, PooledBuffer};
use crate::trust::TrustConfig;
use crate::upstream::DohClient;

/// Configuration for the proxy.
pub struct ProxyConfig {
    /// Local UDP address to bind (e.g. 0.0.0.0:53)
    pub listen_addr: SocketAddr,
    /// Upstream DNS-over-HTTPS endpoint
    pub doh_url: String,
    /// Skip TLS certificate verification (overridden by a valid CA bundle)
    pub verify_disabled: bool,
    /// Optional PEM bundle replacing the system trust roots
    pub ca_bundle: Option<PathBuf>,
    /// Per-request timeout for the upstream round trip
    pub timeout: Duration,
}

/// Startup failures. Everything after startup is logged, not propagated.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("failed to bind UDP socket: {0}")]
    Bind(#[from] io::Error),
    #[error("failed to build HTTPS client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A bound proxy, ready to serve queries.
pub struct Proxy {
    socket: Arc<UdpSocket>,
    client: Arc<DohClient>,
    pool: Arc<BufferPool>,
}

impl Proxy {
    /// Bind the UDP socket and build the shared HTTPS client.
    ///
    /// Trust configuration is resolved here, once; a bad CA bundle warns
    /// and falls back rather than failing startup.
    pub async fn bind(config: ProxyConfig) -> Result<Self, ProxyError> {
        let socket = Arc::new(UdpSocket::bind(config.listen_addr).await?);

        let trust = TrustConfig::load(config.verify_disabled, config.ca_bundle.as_deref());
        if trust.root_count() > 0 {
            info!(roots = trust.root_count(), "using custom trust roots");
        }

        let client = Arc::new(DohClient::new(config.doh_url, &trust, config.timeout)?);
        let pool = Arc::new(BufferPool::with_defaults());

        Ok(Self {
            socket,
            client,
            pool,
        })
    }

    /// The bound local address (useful when binding to port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Run the receive loop until a termination signal or a socket error.
    ///
    /// Each successfully read datagram becomes an independent forwarder
    /// task; the loop never waits for them and never caps how many are in
    /// flight. In-flight tasks keep their own handle on the socket, so
    /// shutdown stops new receives without tearing down pending relays.
    pub async fn run(self) {
        info!(
            addr = %self.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            upstream = self.client.base_url(),
            "DNS proxy listening"
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            let mut buf = self.pool.acquire();

            let result = tokio::select! {
                result = self.socket.recv_from(&mut buf) => result,
                signal = &mut shutdown => {
                    info!(signal, "exit by signal");
                    break;
                }
            };

            match result {
                Ok((0, src)) => {
                    // Nothing to forward; the buffer drops straight back
                    // into the pool.
                    warn!(%src, "empty datagram");
                }
                Ok((len, src)) => {
                    let socket = Arc::clone(&self.socket);
                    let client = Arc::clone(&self.client);
                    tokio::spawn(relay_query(socket, client, src, buf, len));
                }
                Err(e) => {
                    error!(error = %e, "UDP receive failed, stopping");
                    break;
                }
            }
        }
    }
}

/// Relay one query: DoH round trip, then the response bytes back over UDP.
///
/// The task owns `buf` for its whole lifetime; dropping it at the end is
/// the single release back to the pool on every path. Failures are logged
/// and swallowed here so they can never reach the receive loop; the DNS
/// client just sees silence and retries on its own schedule.
async fn relay_query(
    socket: Arc<UdpSocket>,
    client: Arc<DohClient>,
    src: SocketAddr,
    mut buf: PooledBuffer,
    len: usize,
) {
    let mut response = match client.fetch(&buf[..len]).await {
        Ok(response) => response,
        Err(e) => {
            warn!(%src, error = %e, "DoH request failed");
            return;
        }
    };

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        warn!(%src, status = status.as_u16(), "unexpected upstream status");
        return;
    }

    // Single body read: whatever the first chunk holds, capped at the
    // buffer size, is the entire relayed response. DNS answers fit; bigger
    // bodies are truncated, not reassembled.
    match response.chunk().await {
        Ok(Some(chunk)) => {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);

            if let Err(e) = socket.send_to(&buf[..n], src).await {
                warn!(%src, error = %e, "UDP response send failed");
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!(%src, error = %e, "DoH response body read failed");
        }
    }
}

/// Resolve when a termination signal arrives, yielding its name for the log.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");
    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to register SIGQUIT handler");
    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

    tokio::select! {
        _ = hangup.recv() => "hangup",
        _ = interrupt.recv() => "interrupt",
        _ = quit.recv() => "quit",
        _ = terminate.recv() => "terminate",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
