//! Transport layer subsystem.
//!
//! # Data Flow
//! ```text
//! TransportSocket::bind → listen
//!     → accept (one TransportSocket per connection, keep-alive applied)
//!     → tls.rs (optional in-place upgrade, client certificate hook)
//!     → send / receive over the current stream
//!     → close (cancel scope, release stream, release handle)
//! ```
//!
//! # Design Decisions
//! - Cancellation is an outcome, not an error
//! - Exactly one terminal outcome per operation
//! - Plaintext → secured happens at most once; there is no way back

pub mod cancel;
pub mod connection;
pub mod error;
pub mod keepalive;
pub mod outcome;
pub mod socket;
pub mod stream;
pub mod tls;

pub use cancel::CancellationScope;
pub use connection::{ConnectionId, ConnectionIdentity, ConnectionTracker};
pub use error::{ErrorKind, TransportError};
pub use keepalive::KeepAlive;
pub use outcome::{deliver, Outcome};
pub use socket::{SocketOptions, TransportSocket, MAX_BACKLOG};
pub use tls::{
    ClientCertificateEvent, ClientCertificateHook, HandshakeState, LoggingHook, SessionInfo,
    TlsProtocol, TlsUpgrader,
};
