//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → close listener (accept resolves Cancelled)
//!             → close connections → drain tracker → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
