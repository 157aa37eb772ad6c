//! TCP keep-alive tuning.
//!
//! The kernel defaults on most systems are huge (~7200s before the first
//! probe). Connection-mode sockets get something more reasonable applied at
//! construction, where the platform lets us.

use std::time::Duration;

use tokio::net::TcpStream;

/// Idle time before the first keep-alive probe.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(60_000);

/// Interval between unanswered probes.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10_000);

/// Keep-alive settings for connection-mode sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub enabled: bool,
    pub probe_interval: Duration,
    pub retry_interval: Duration,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl KeepAlive {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Apply to a connected stream.
    ///
    /// Returns `true` when the settings took effect. Platforms without the
    /// interval controls, and setsockopt failures, are skipped silently.
    pub fn apply(&self, stream: &TcpStream) -> bool {
        if !self.enabled {
            return false;
        }
        self.apply_platform(stream)
    }

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        windows
    ))]
    fn apply_platform(&self, stream: &TcpStream) -> bool {
        let params = socket2::TcpKeepalive::new()
            .with_time(self.probe_interval)
            .with_interval(self.retry_interval);

        match socket2::SockRef::from(stream).set_tcp_keepalive(&params) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Keep-alive not applied");
                false
            }
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        windows
    )))]
    fn apply_platform(&self, _stream: &TcpStream) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn defaults_match_documented_intervals() {
        let keepalive = KeepAlive::default();
        assert!(keepalive.enabled);
        assert_eq!(keepalive.probe_interval.as_millis(), 60_000);
        assert_eq!(keepalive.retry_interval.as_millis(), 10_000);
    }

    #[tokio::test]
    async fn disabled_keepalive_is_not_applied() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        assert!(!KeepAlive::disabled().apply(&client));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn applies_on_linux() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        assert!(KeepAlive::default().apply(&client));
    }
}
