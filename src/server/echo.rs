//! Echo server over transport sockets.
//!
//! Accepts connections, optionally upgrades each to TLS, and writes every
//! received chunk straight back. The payload is never interpreted.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::TransportConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::error::TransportError;
use crate::net::outcome::Outcome;
use crate::net::socket::TransportSocket;
use crate::net::tls::{LoggingHook, TlsProtocol, TlsUpgrader};
use crate::security::identity::{load_certificate, IdentityError, ServerIdentity};
use crate::security::pinning::PinnedCertificateHook;

const RECEIVE_BUFFER: usize = 16 * 1024;

/// Pause after a failed accept (e.g. EMFILE) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address: {0}")]
    Address(#[from] AddrParseError),

    #[error("failed to load TLS material: {0}")]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone)]
struct TlsSettings {
    upgrader: TlsUpgrader,
    protocols: Vec<TlsProtocol>,
}

/// Echo server driven by a [`TransportConfig`].
pub struct EchoServer {
    config: TransportConfig,
    identity: Option<ServerIdentity>,
    tls: Option<TlsSettings>,
    tracker: ConnectionTracker,
}

impl EchoServer {
    /// Prepare the server, loading TLS material if configured.
    pub fn new(config: TransportConfig) -> Result<Self, ServerError> {
        let (identity, tls) = match &config.tls {
            Some(tls) => {
                let identity = ServerIdentity::from_pem_files(&tls.cert_path, &tls.key_path)?;
                let upgrader = match &tls.reference_cert_path {
                    Some(path) => TlsUpgrader::new(PinnedCertificateHook::new(load_certificate(path)?)),
                    None => TlsUpgrader::new(LoggingHook),
                };
                let settings = TlsSettings {
                    upgrader,
                    protocols: tls.protocols.clone(),
                };
                (Some(identity), Some(settings))
            }
            None => (None, None),
        };
        Ok(Self::from_parts(config, identity, tls))
    }

    /// Build with an identity already in hand; `protocols` enables TLS.
    pub fn with_identity(
        config: TransportConfig,
        identity: ServerIdentity,
        upgrader: TlsUpgrader,
        protocols: Vec<TlsProtocol>,
    ) -> Self {
        let tls = TlsSettings {
            upgrader,
            protocols,
        };
        Self::from_parts(config, Some(identity), Some(tls))
    }

    fn from_parts(
        config: TransportConfig,
        identity: Option<ServerIdentity>,
        tls: Option<TlsSettings>,
    ) -> Self {
        Self {
            config,
            identity,
            tls,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Bind and listen on the configured address.
    pub fn bind(&self) -> Result<TransportSocket, ServerError> {
        let addr: SocketAddr = self.config.listener.bind_address.parse()?;
        let listener = TransportSocket::bind_with(addr, self.config.socket_options())?;
        if let Some(identity) = &self.identity {
            listener.set_identity(identity.clone());
        }
        listener.listen(self.config.listener.backlog)?;
        Ok(listener)
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept until `shutdown` fires, then drain open connections.
    pub async fn run(&self, listener: TransportSocket, shutdown: Shutdown) {
        let mut stop = shutdown.subscribe();

        loop {
            let accepted = tokio::select! {
                _ = stop.recv() => {
                    listener.close().await;
                    break;
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(Outcome::Completed(socket)) => {
                    let guard = self.tracker.track(socket.id());
                    let tls = self.tls.clone();
                    let stop = shutdown.subscribe();
                    tokio::spawn(async move {
                        serve_connection(socket, tls, stop).await;
                        drop(guard);
                    });
                }
                Ok(Outcome::Cancelled) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }

        let limit = Duration::from_secs(self.config.listener.drain_timeout_secs);
        if !self.tracker.drain(limit).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
    }
}

async fn serve_connection(
    socket: TransportSocket,
    tls: Option<TlsSettings>,
    mut stop: tokio::sync::broadcast::Receiver<()>,
) {
    if let Some(tls) = tls {
        match tls.upgrader.authenticate(&socket, &tls.protocols).await {
            Ok(Outcome::Completed(_)) => {}
            Ok(Outcome::Cancelled) | Err(_) => {
                socket.close().await;
                return;
            }
        }
    }

    let mut buf = vec![0u8; RECEIVE_BUFFER];
    loop {
        let received = tokio::select! {
            _ = stop.recv() => break,
            received = socket.receive(&mut buf, 0) => received,
        };

        let n = match received {
            Ok(Outcome::Completed(0)) | Ok(Outcome::Cancelled) => break,
            Ok(Outcome::Completed(n)) => n,
            Err(e) => {
                tracing::debug!(connection_id = %socket.id(), error = %e, "Receive failed");
                break;
            }
        };

        match socket.send(&buf[..n]).await {
            Ok(Outcome::Completed(())) => {}
            Ok(Outcome::Cancelled) => break,
            Err(e) => {
                tracing::debug!(connection_id = %socket.id(), error = %e, "Send failed");
                break;
            }
        }
    }

    socket.close().await;
}
