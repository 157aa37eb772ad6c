//! Client certificate pinning hook.
//!
//! Compares each presented client certificate with a configured reference
//! certificate through a [`CertificateValidationChain`]. The verdict is
//! logged and counted; like every hook it cannot abort the handshake.

use std::sync::Arc;

use crate::net::tls::{ClientCertificateEvent, ClientCertificateHook};
use crate::observability::metrics;
use crate::security::certificate::Certificate;
use crate::security::validation::CertificateValidationChain;

#[derive(Debug, Clone)]
pub struct PinnedCertificateHook {
    reference: Certificate,
    chain: Arc<CertificateValidationChain>,
}

impl PinnedCertificateHook {
    pub fn new(reference: Certificate) -> Self {
        Self::with_chain(reference, Arc::new(CertificateValidationChain::default()))
    }

    pub fn with_chain(reference: Certificate, chain: Arc<CertificateValidationChain>) -> Self {
        Self { reference, chain }
    }

    pub fn reference(&self) -> &Certificate {
        &self.reference
    }
}

impl ClientCertificateHook for PinnedCertificateHook {
    fn on_client_certificate(&self, event: &ClientCertificateEvent) -> bool {
        let presented = &event.certificate;
        match self.chain.failing_check(presented, &self.reference) {
            None => {
                metrics::record_certificate_check(true);
                tracing::info!(
                    connection = %event.connection,
                    fingerprint = %presented.fingerprint_sha256(),
                    "Client certificate matches reference"
                );
                true
            }
            Some(check) => {
                metrics::record_certificate_check(false);
                tracing::warn!(
                    connection = %event.connection,
                    fingerprint = %presented.fingerprint_sha256(),
                    expected = %self.reference.fingerprint_sha256(),
                    failed_check = check.name(),
                    "Client certificate does not match reference"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::{ConnectionId, ConnectionIdentity};

    fn event(der: &[u8]) -> ClientCertificateEvent {
        ClientCertificateEvent {
            certificate: Certificate::from_der(der.to_vec()),
            intermediates: Vec::new(),
            connection: ConnectionIdentity {
                id: ConnectionId::new(),
                remote: None,
            },
        }
    }

    #[test]
    fn matching_certificate_is_accepted() {
        let hook = PinnedCertificateHook::new(Certificate::from_der(vec![1, 2, 3]));
        assert!(hook.on_client_certificate(&event(&[1, 2, 3])));
    }

    #[test]
    fn longer_certificate_is_flagged() {
        let hook = PinnedCertificateHook::new(Certificate::from_der(vec![1, 2, 3]));
        assert!(!hook.on_client_certificate(&event(&[1, 2, 3, 4])));
    }
}
