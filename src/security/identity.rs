//! Server identity (certificate chain + signing key) and its loading.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use thiserror::Error;

use crate::security::certificate::Certificate;

/// Errors raised while loading an identity or reference certificate.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("unsupported private key: {0}")]
    UnsupportedKey(#[source] rustls::Error),
}

/// The certificate this side presents when acting as the TLS server.
///
/// Immutable once built and shared across all handshakes.
#[derive(Clone)]
pub struct ServerIdentity {
    certified: Arc<CertifiedKey>,
}

impl ServerIdentity {
    /// Build from a DER chain (leaf first) and its private key.
    pub fn from_der(
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, IdentityError> {
        let provider = crate::net::tls::crypto_provider();
        Self::with_provider(&provider, chain, key)
    }

    fn with_provider(
        provider: &CryptoProvider,
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, IdentityError> {
        let signing_key = provider
            .key_provider
            .load_private_key(key)
            .map_err(IdentityError::UnsupportedKey)?;
        Ok(Self {
            certified: Arc::new(CertifiedKey::new(chain, signing_key)),
        })
    }

    /// Load a PEM certificate chain and PEM private key.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, IdentityError> {
        let chain = read_certificates(cert_path)?;
        if chain.is_empty() {
            return Err(IdentityError::NoCertificate(cert_path.to_path_buf()));
        }

        let mut reader = open(key_path)?;
        let key = rustls_pemfile::private_key(&mut reader)
            .map_err(|source| IdentityError::Io {
                path: key_path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| IdentityError::NoPrivateKey(key_path.to_path_buf()))?;

        Self::from_der(chain, key)
    }

    /// Leaf certificate.
    pub fn leaf(&self) -> Option<Certificate> {
        self.certified.cert.first().cloned().map(Certificate::from)
    }

    pub(crate) fn resolver(&self) -> Arc<dyn ResolvesServerCert> {
        Arc::new(FixedIdentity(self.certified.clone()))
    }
}

impl fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("chain_len", &self.certified.cert.len())
            .field("leaf", &self.leaf())
            .finish()
    }
}

/// Always presents the same certified key, whatever the client hello says.
#[derive(Debug)]
struct FixedIdentity(Arc<CertifiedKey>);

impl ResolvesServerCert for FixedIdentity {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.0.clone())
    }
}

/// Load the first certificate of a PEM file, e.g. a pinned reference certificate.
pub fn load_certificate(path: &Path) -> Result<Certificate, IdentityError> {
    read_certificates(path)?
        .into_iter()
        .next()
        .map(Certificate::from)
        .ok_or_else(|| IdentityError::NoCertificate(path.to_path_buf()))
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, IdentityError> {
    let mut reader = open(path)?;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn open(path: &Path) -> Result<BufReader<File>, IdentityError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::PrivatePkcs8KeyDer;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ws-transport-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn builds_from_generated_der() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(generated.key_pair.serialize_der()));
        let identity = ServerIdentity::from_der(vec![generated.cert.der().clone()], key).unwrap();

        let leaf = identity.leaf().unwrap();
        assert_eq!(leaf.as_der(), generated.cert.der().as_ref());
    }

    #[test]
    fn loads_pem_files() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let dir = scratch_dir("identity-pem");
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, generated.cert.pem()).unwrap();
        std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

        let identity = ServerIdentity::from_pem_files(&cert_path, &key_path).unwrap();
        assert!(identity.leaf().is_some());

        let reference = load_certificate(&cert_path).unwrap();
        assert_eq!(reference.as_der(), generated.cert.der().as_ref());
    }

    #[test]
    fn missing_key_is_reported() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let dir = scratch_dir("identity-nokey");
        let cert_path = dir.join("cert.pem");
        std::fs::write(&cert_path, generated.cert.pem()).unwrap();

        let err = ServerIdentity::from_pem_files(&cert_path, &cert_path).unwrap_err();
        assert!(matches!(err, IdentityError::NoPrivateKey(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_certificate(Path::new("/nonexistent/ws-transport.pem")).unwrap_err();
        assert!(matches!(err, IdentityError::Io { .. }));
    }
}
