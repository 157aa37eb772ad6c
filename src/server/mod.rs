//! Demonstration server.
//!
//! # Data Flow
//! ```text
//! TransportConfig
//!     → EchoServer::bind (bind + listen, identity attached)
//!     → accept loop (one task per connection, tracked for drain)
//!     → optional TLS upgrade
//!     → receive → send back, until EOF or shutdown
//! ```

pub mod echo;

pub use echo::{EchoServer, ServerError};
