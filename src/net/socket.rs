//! Transport socket: one raw TCP handle plus its current stream.
//!
//! # Responsibilities
//! - Passive-socket surface: bind, listen, accept
//! - Whole-buffer send and offset receive over the current stream
//! - Idempotent close: cancel scope → release stream → release handle
//! - Live remote endpoint queries with an "unknown" (`None`) sentinel
//!
//! # Design Decisions
//! - Handles are cheap clones of one shared socket; the last drop cancels
//!   the scope
//! - Every operation runs through the socket's [`CancellationScope`]
//! - Read and write halves are locked independently, so a pending receive
//!   never blocks a send
//! - A duplicated OS handle answers endpoint queries without touching the
//!   stream locks

use std::fmt;
use std::net::{IpAddr, Shutdown, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::net::cancel::CancellationScope;
use crate::net::connection::{ConnectionId, ConnectionIdentity};
use crate::net::error::TransportError;
use crate::net::keepalive::KeepAlive;
use crate::net::outcome::Outcome;
use crate::net::stream::{ConnectionStream, StreamSlots};
use crate::net::tls::HandshakeState;
use crate::observability::metrics;
use crate::security::identity::ServerIdentity;

/// Largest accepted listen backlog.
pub const MAX_BACKLOG: i32 = 65_535;

/// Upper bound on the graceful part of `close` (TLS close_notify, FIN).
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Options applied to connection-mode sockets at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketOptions {
    pub keepalive: KeepAlive,
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            keepalive: KeepAlive::default(),
            nodelay: true,
        }
    }
}

enum Endpoint {
    Bound(TcpSocket),
    Listening(Arc<TcpListener>),
    Connected,
    Released,
}

struct SocketInner {
    id: ConnectionId,
    scope: CancellationScope,
    options: SocketOptions,
    identity: Mutex<Option<ServerIdentity>>,
    endpoint: Mutex<Endpoint>,
    /// Duplicate of the connection's OS handle, for endpoint queries.
    control: Mutex<Option<socket2::Socket>>,
    streams: StreamSlots,
    handshake: Mutex<HandshakeState>,
}

impl Drop for SocketInner {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Asynchronous wrapper around one TCP connection or listener.
#[derive(Clone)]
pub struct TransportSocket {
    inner: Arc<SocketInner>,
}

impl TransportSocket {
    fn from_parts(
        endpoint: Endpoint,
        streams: StreamSlots,
        control: Option<socket2::Socket>,
        options: SocketOptions,
        identity: Option<ServerIdentity>,
    ) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                id: ConnectionId::new(),
                scope: CancellationScope::new(),
                options,
                identity: Mutex::new(identity),
                endpoint: Mutex::new(endpoint),
                control: Mutex::new(control),
                streams,
                handshake: Mutex::new(HandshakeState::NotStarted),
            }),
        }
    }

    /// Create a socket bound to `addr`, ready for [`listen`](Self::listen).
    pub fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        Self::bind_with(addr, SocketOptions::default())
    }

    /// Like [`bind`](Self::bind); accepted connections inherit `options`.
    pub fn bind_with(addr: SocketAddr, options: SocketOptions) -> Result<Self, TransportError> {
        let bind_err = |source| TransportError::Bind { addr, source };
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;

        #[cfg(unix)]
        socket.set_reuseaddr(true).map_err(bind_err)?;

        socket.bind(addr).map_err(bind_err)?;

        Ok(Self::from_parts(
            Endpoint::Bound(socket),
            StreamSlots::default(),
            None,
            options,
            None,
        ))
    }

    /// Wrap a listener that is already accepting.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self::from_listener_with(listener, SocketOptions::default())
    }

    pub fn from_listener_with(listener: TcpListener, options: SocketOptions) -> Self {
        Self::from_parts(
            Endpoint::Listening(Arc::new(listener)),
            StreamSlots::default(),
            None,
            options,
            None,
        )
    }

    /// Wrap a connected stream with default options.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self::from_stream_with(stream, SocketOptions::default())
    }

    /// Wrap a connected stream, applying keep-alive and `TCP_NODELAY`.
    pub fn from_stream_with(stream: TcpStream, options: SocketOptions) -> Self {
        Self::connection(stream, options, None)
    }

    fn connection(
        stream: TcpStream,
        options: SocketOptions,
        identity: Option<ServerIdentity>,
    ) -> Self {
        options.keepalive.apply(&stream);
        if let Err(e) = stream.set_nodelay(options.nodelay) {
            tracing::debug!(error = %e, "TCP_NODELAY not applied");
        }
        let control = match socket2::SockRef::from(&stream).try_clone() {
            Ok(control) => Some(control),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to duplicate socket handle; remote endpoint unknown");
                None
            }
        };

        Self::from_parts(
            Endpoint::Connected,
            StreamSlots::new(ConnectionStream::Plain(stream)),
            control,
            options,
            identity,
        )
    }

    /// Start listening with the given backlog.
    ///
    /// The backlog must lie in `0..=MAX_BACKLOG`.
    pub fn listen(&self, backlog: i32) -> Result<(), TransportError> {
        if !(0..=MAX_BACKLOG).contains(&backlog) {
            return Err(TransportError::InvalidBacklog(backlog));
        }

        let mut endpoint = lock(&self.inner.endpoint);
        match std::mem::replace(&mut *endpoint, Endpoint::Released) {
            Endpoint::Bound(socket) => {
                // Range-checked above.
                let listener = socket
                    .listen(backlog as u32)
                    .map_err(TransportError::Listen)?;
                tracing::info!(
                    connection_id = %self.inner.id,
                    address = ?listener.local_addr().ok(),
                    backlog,
                    "Listener bound"
                );
                *endpoint = Endpoint::Listening(Arc::new(listener));
                Ok(())
            }
            other => {
                *endpoint = other;
                Err(TransportError::NotBound)
            }
        }
    }

    /// Wait for the next incoming connection.
    ///
    /// Resolves to `Cancelled` once the scope is triggered, including for a
    /// connection that arrives concurrently with the cancellation (it is
    /// dropped). Accepted sockets inherit this socket's options and identity.
    pub async fn accept(&self) -> Result<Outcome<TransportSocket>, TransportError> {
        let scope = &self.inner.scope;
        if scope.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let listener = match &*lock(&self.inner.endpoint) {
            Endpoint::Listening(listener) => listener.clone(),
            _ => return Err(TransportError::NotListening),
        };

        let accepted = scope
            .guard(listener.accept())
            .await
            .map_err(TransportError::Accept)?;

        Ok(accepted.map(|(stream, remote)| {
            let socket = Self::connection(stream, self.inner.options, self.identity());
            metrics::record_accept();
            tracing::debug!(
                listener_id = %self.inner.id,
                connection_id = %socket.id(),
                remote = %remote,
                "Connection accepted"
            );
            socket
        }))
    }

    /// Write the whole buffer to the current stream.
    ///
    /// Returns `Cancelled` without touching the stream if the scope is
    /// already cancelled. Concurrent sends are serialized in call order.
    pub async fn send(&self, buf: &[u8]) -> Result<Outcome<()>, TransportError> {
        let scope = &self.inner.scope;
        if scope.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let outcome = scope
            .guard(async {
                let mut writer = self.inner.streams.writer.lock().await;
                let writer = writer.as_mut().ok_or(TransportError::NotConnected)?;
                writer.write_all(buf).await.map_err(TransportError::Send)?;
                writer.flush().await.map_err(TransportError::Send)
            })
            .await?;

        if !outcome.is_cancelled() {
            metrics::record_bytes_sent(buf.len());
        }
        Ok(outcome)
    }

    /// Read into `buf[offset..]`.
    ///
    /// `Completed(0)` means the peer shut down its side in an orderly way.
    /// The tail must be non-empty, so `offset` has to be below `buf.len()`.
    pub async fn receive(
        &self,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<Outcome<usize>, TransportError> {
        let scope = &self.inner.scope;
        if scope.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let len = buf.len();
        if offset >= len {
            return Err(TransportError::InvalidOffset { offset, len });
        }
        let tail = &mut buf[offset..];

        let outcome = scope
            .guard(async move {
                let mut reader = self.inner.streams.reader.lock().await;
                let reader = reader.as_mut().ok_or(TransportError::NotConnected)?;
                reader.read(tail).await.map_err(TransportError::Receive)
            })
            .await?;

        if let Outcome::Completed(n) = outcome {
            metrics::record_bytes_received(n);
        }
        Ok(outcome)
    }

    /// Tear the socket down. Idempotent and infallible.
    ///
    /// Cancels the scope first so pending operations unwind, then shuts the
    /// stream down (best effort, bounded), then releases the OS handle.
    pub async fn close(&self) {
        let already_closed = self.inner.scope.is_cancelled();
        self.inner.scope.cancel();

        {
            let (mut writer, mut reader) = self.inner.streams.lock_both().await;
            if let (Some(r), Some(w)) = (reader.take(), writer.take()) {
                let mut stream = r.unsplit(w);
                if let Err(e) = tokio::time::timeout(CLOSE_GRACE, stream.shutdown())
                    .await
                    .unwrap_or(Ok(()))
                {
                    tracing::trace!(connection_id = %self.inner.id, error = %e, "Stream shutdown failed");
                }
            }
        }

        if let Some(control) = lock(&self.inner.control).take() {
            if let Err(e) = control.shutdown(Shutdown::Both) {
                tracing::trace!(connection_id = %self.inner.id, error = %e, "Socket shutdown failed");
            }
        }
        *lock(&self.inner.endpoint) = Endpoint::Released;

        if !already_closed {
            tracing::debug!(connection_id = %self.inner.id, "Socket closed");
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn scope(&self) -> &CancellationScope {
        &self.inner.scope
    }

    pub fn options(&self) -> SocketOptions {
        self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.scope.is_cancelled()
    }

    /// Remote endpoint of the live connection, `None` when unknown.
    pub fn remote_endpoint(&self) -> Option<SocketAddr> {
        lock(&self.inner.control)
            .as_ref()?
            .peer_addr()
            .ok()?
            .as_socket()
    }

    pub fn remote_ip_address(&self) -> Option<IpAddr> {
        self.remote_endpoint().map(|addr| addr.ip())
    }

    pub fn remote_port(&self) -> Option<u16> {
        self.remote_endpoint().map(|addr| addr.port())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*lock(&self.inner.endpoint) {
            Endpoint::Bound(socket) => socket.local_addr().ok(),
            Endpoint::Listening(listener) => listener.local_addr().ok(),
            Endpoint::Connected => lock(&self.inner.control)
                .as_ref()?
                .local_addr()
                .ok()?
                .as_socket(),
            Endpoint::Released => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.remote_endpoint().is_some()
    }

    /// Identity certificate presented when this socket is upgraded to TLS.
    pub fn identity(&self) -> Option<ServerIdentity> {
        lock(&self.inner.identity).clone()
    }

    pub fn set_identity(&self, identity: ServerIdentity) {
        *lock(&self.inner.identity) = Some(identity);
    }

    pub fn handshake_state(&self) -> HandshakeState {
        *lock(&self.inner.handshake)
    }

    pub fn is_secured(&self) -> bool {
        self.handshake_state() == HandshakeState::Secured
    }

    pub(crate) fn connection_identity(&self) -> ConnectionIdentity {
        ConnectionIdentity {
            id: self.inner.id,
            remote: self.remote_endpoint(),
        }
    }

    pub(crate) fn streams(&self) -> &StreamSlots {
        &self.inner.streams
    }

    /// Move `NotStarted → InFlight`, or explain why not.
    ///
    /// `close` cancels the scope before it releases the endpoint, so a
    /// released endpoint seen here always reports `Cancelled`.
    pub(crate) fn begin_handshake(&self) -> Result<Outcome<()>, TransportError> {
        if !matches!(*lock(&self.inner.endpoint), Endpoint::Connected) {
            if self.inner.scope.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }
            return Err(TransportError::NotConnected);
        }
        let mut state = lock(&self.inner.handshake);
        match *state {
            HandshakeState::NotStarted => {
                *state = HandshakeState::InFlight;
                Ok(Outcome::Completed(()))
            }
            current => Err(TransportError::InvalidHandshakeState(current)),
        }
    }

    pub(crate) fn set_handshake_state(&self, next: HandshakeState) {
        *lock(&self.inner.handshake) = next;
    }
}

impl fmt::Debug for TransportSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSocket")
            .field("id", &self.inner.id)
            .field("remote", &self.remote_endpoint())
            .field("handshake", &self.handshake_state())
            .field("closed", &self.is_closed())
            .finish()
    }
}
