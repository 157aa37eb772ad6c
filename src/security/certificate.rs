//! X.509 certificate values exchanged during a handshake.

use std::fmt;

use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate};

/// An owned, DER-encoded certificate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    der: CertificateDer<'static>,
}

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self {
            der: CertificateDer::from(der.into()),
        }
    }

    /// Raw DER encoding.
    pub fn as_der(&self) -> &[u8] {
        self.der.as_ref()
    }

    pub fn len(&self) -> usize {
        self.der.len()
    }

    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }

    /// Lowercase hex SHA-256 of the DER encoding.
    pub fn fingerprint_sha256(&self) -> String {
        hex::encode(Sha256::digest(self.as_der()))
    }

    /// Issuer DN and serial number as raw DER slices, if the encoding parses.
    pub(crate) fn issuer_and_serial(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let (_, cert) = X509Certificate::from_der(self.as_der()).ok()?;
        Some((cert.issuer().as_raw().to_vec(), cert.raw_serial().to_vec()))
    }

    pub fn to_der(&self) -> CertificateDer<'static> {
        self.der.clone()
    }
}

impl From<CertificateDer<'_>> for Certificate {
    fn from(der: CertificateDer<'_>) -> Self {
        Self {
            der: der.into_owned(),
        }
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("len", &self.len())
            .field("sha256", &self.fingerprint_sha256())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex() {
        let cert = Certificate::from_der(vec![1, 2, 3]);
        let fp = cert.fingerprint_sha256();
        assert_eq!(fp.len(), 64);
        assert_eq!(
            fp,
            "039058c6f2c0cb492c533b0a4d14ef77cc0f78abccced5287d84a1a2011cfb81"
        );
    }

    #[test]
    fn garbage_encoding_has_no_issuer() {
        assert!(Certificate::from_der(vec![1, 2, 3]).issuer_and_serial().is_none());
    }

    #[test]
    fn parses_generated_certificate() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let cert = Certificate::from(generated.cert.der().clone());
        let (issuer, serial) = cert.issuer_and_serial().unwrap();
        assert!(!issuer.is_empty());
        assert!(!serial.is_empty());
    }
}
