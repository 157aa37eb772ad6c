//! Transport error taxonomy.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::net::tls::HandshakeState;

/// Broad class of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection or stream failure (reset, closed, unreachable, misuse).
    Transport,
    /// Secure negotiation failure (protocol mismatch, bad identity).
    Handshake,
}

/// Error type for transport socket and TLS upgrade operations.
///
/// Cancellation is deliberately absent: it is reported as
/// [`Outcome::Cancelled`](crate::net::Outcome::Cancelled).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid listen backlog {0} (expected 0..={max})", max = crate::net::socket::MAX_BACKLOG)]
    InvalidBacklog(i32),

    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),

    #[error("socket is not bound")]
    NotBound,

    #[error("socket is not listening")]
    NotListening,

    #[error("socket is not connected")]
    NotConnected,

    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    #[error("failed to send: {0}")]
    Send(#[source] io::Error),

    #[error("failed to receive: {0}")]
    Receive(#[source] io::Error),

    #[error("receive offset {offset} leaves no room in a buffer of length {len}")]
    InvalidOffset { offset: usize, len: usize },

    #[error("no identity certificate configured for the server role")]
    MissingIdentity,

    #[error("no TLS protocol versions enabled")]
    NoProtocols,

    #[error("TLS handshake not permitted in state {0:?}")]
    InvalidHandshakeState(HandshakeState),

    #[error("TLS configuration rejected: {0}")]
    TlsConfig(#[source] rustls::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::MissingIdentity
            | TransportError::NoProtocols
            | TransportError::InvalidHandshakeState(_)
            | TransportError::TlsConfig(_)
            | TransportError::Handshake(_) => ErrorKind::Handshake,
            _ => ErrorKind::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_handshake_faults() {
        let err = TransportError::Handshake(io::Error::new(
            io::ErrorKind::InvalidData,
            "peer is incompatible",
        ));
        assert_eq!(err.kind(), ErrorKind::Handshake);
        assert_eq!(TransportError::NoProtocols.kind(), ErrorKind::Handshake);
    }

    #[test]
    fn classifies_transport_faults() {
        let err = TransportError::Send(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(TransportError::InvalidBacklog(-1).kind(), ErrorKind::Transport);
    }

    #[test]
    fn backlog_message_names_range() {
        let message = TransportError::InvalidBacklog(-5).to_string();
        assert!(message.contains("-5"));
        assert!(message.contains("65535"));
    }
}
