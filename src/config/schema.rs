//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every field
//! has a default so a minimal (even empty) file is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::keepalive::{KeepAlive, DEFAULT_PROBE_INTERVAL, DEFAULT_RETRY_INTERVAL};
use crate::net::socket::SocketOptions;
use crate::net::tls::TlsProtocol;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TransportConfig {
    /// Listener configuration (bind address, backlog).
    pub listener: ListenerConfig,

    /// Keep-alive applied to accepted connections.
    pub keepalive: KeepAliveConfig,

    /// Optional TLS upgrade of accepted connections.
    pub tls: Option<TlsConfig>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl TransportConfig {
    /// Socket options handed to the listener and inherited by connections.
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            keepalive: self.keepalive.to_keepalive(),
            nodelay: self.listener.nodelay,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8181").
    pub bind_address: String,

    /// Pending-connection queue length.
    pub backlog: i32,

    /// Disable Nagle's algorithm on accepted connections.
    pub nodelay: bool,

    /// Grace period for open connections on shutdown.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8181".to_string(),
            backlog: 1024,
            nodelay: true,
            drain_timeout_secs: 10,
        }
    }
}

/// Keep-alive tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    pub enabled: bool,

    /// Idle time before the first probe.
    pub probe_interval_ms: u64,

    /// Interval between unanswered probes.
    pub retry_interval_ms: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL.as_millis() as u64,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL.as_millis() as u64,
        }
    }
}

impl KeepAliveConfig {
    pub fn to_keepalive(&self) -> KeepAlive {
        KeepAlive {
            enabled: self.enabled,
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

/// TLS configuration for accepted connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,

    /// Protocol versions to negotiate.
    #[serde(default = "default_protocols")]
    pub protocols: Vec<TlsProtocol>,

    /// Expected client certificate (PEM). Mismatches are logged, not rejected.
    #[serde(default)]
    pub reference_cert_path: Option<PathBuf>,
}

fn default_protocols() -> Vec<TlsProtocol> {
    TlsProtocol::ALL.to_vec()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "ws_transport=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: TransportConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.backlog, 1024);
        assert!(config.tls.is_none());
        assert_eq!(config.keepalive.probe_interval_ms, 60_000);
        assert_eq!(config.keepalive.retry_interval_ms, 10_000);
    }

    #[test]
    fn tls_section_defaults_protocols() {
        let config: TransportConfig = toml::from_str(
            r#"
            [tls]
            cert_path = "cert.pem"
            key_path = "key.pem"
            "#,
        )
        .unwrap();
        let tls = config.tls.unwrap();
        assert_eq!(tls.protocols, TlsProtocol::ALL.to_vec());
        assert!(tls.reference_cert_path.is_none());
    }

    #[test]
    fn socket_options_follow_config() {
        let config: TransportConfig = toml::from_str(
            r#"
            [listener]
            nodelay = false

            [keepalive]
            enabled = false
            probe_interval_ms = 5000
            "#,
        )
        .unwrap();
        let options = config.socket_options();
        assert!(!options.nodelay);
        assert!(!options.keepalive.enabled);
        assert_eq!(options.keepalive.probe_interval, Duration::from_secs(5));
        assert_eq!(options.keepalive.retry_interval, DEFAULT_RETRY_INTERVAL);
    }

    #[test]
    fn json_log_format_parses() {
        let config: TransportConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
