//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TransportConfig (validated, immutable)
//!     → SocketOptions / TlsConfig handed to the transport layer
//! ```
//!
//! # Design Decisions
//! - Loaded once at startup; there is no reload
//! - Every field has a default, so an empty file is a valid config
//! - serde rejects malformed input, validation.rs rejects nonsense values

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{KeepAliveConfig, ListenerConfig, LogFormat, ObservabilityConfig, TlsConfig, TransportConfig};
