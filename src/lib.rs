//! Cancellable TCP transport with an in-place TLS upgrade.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;
pub mod server;

pub use config::schema::TransportConfig;
pub use lifecycle::Shutdown;
pub use net::{CancellationScope, Outcome, TlsUpgrader, TransportError, TransportSocket};
pub use security::{Certificate, CertificateValidationChain};
pub use server::EchoServer;
