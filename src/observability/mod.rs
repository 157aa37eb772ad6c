//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Transport + TLS + certificate hooks produce:
//!     → logging.rs (structured log events, connection_id fields)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
