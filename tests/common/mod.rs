//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme, SupportedProtocolVersion};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use ws_transport::net::TransportSocket;
use ws_transport::security::{Certificate, ServerIdentity};

/// A generated certificate together with its PKCS#8 key.
pub struct TestCert {
    pub der: CertificateDer<'static>,
    pub key_der: Vec<u8>,
    pub cert_pem: String,
    pub key_pem: String,
}

impl TestCert {
    pub fn generate(name: &str) -> Self {
        let generated = rcgen::generate_simple_self_signed(vec![name.to_string()]).unwrap();
        Self {
            der: generated.cert.der().clone(),
            key_der: generated.key_pair.serialize_der(),
            cert_pem: generated.cert.pem(),
            key_pem: generated.key_pair.serialize_pem(),
        }
    }

    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()))
    }

    pub fn certificate(&self) -> Certificate {
        Certificate::from(self.der.clone())
    }

    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity::from_der(vec![self.der.clone()], self.key()).unwrap()
    }
}

/// Bind to an ephemeral loopback port and start listening.
pub fn listener() -> (TransportSocket, SocketAddr) {
    let socket = TransportSocket::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    socket.listen(128).unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

/// Connect a raw client and accept the server side of the connection.
pub async fn connected_pair(listener: &TransportSocket, addr: SocketAddr) -> (TransportSocket, TcpStream) {
    let (accepted, client) = tokio::join!(listener.accept(), TcpStream::connect(addr));
    let server = accepted.unwrap().completed().expect("accept was not cancelled");
    (server, client.unwrap())
}

/// Server certificates in these tests are self-signed leaves, so the client
/// trusts whatever it is shown.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build a TLS client, optionally presenting `client_cert`.
pub fn connector(
    versions: &[&'static SupportedProtocolVersion],
    client_cert: Option<&TestCert>,
) -> TlsConnector {
    let builder = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_protocol_versions(versions)
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert));

    let config = match client_cert {
        Some(cert) => builder
            .with_client_auth_cert(vec![cert.der.clone()], cert.key())
            .unwrap(),
        None => builder.with_no_client_auth(),
    };
    TlsConnector::from(Arc::new(config))
}

pub async fn tls_connect(
    connector: &TlsConnector,
    stream: TcpStream,
) -> std::io::Result<TlsStream<TcpStream>> {
    let name = ServerName::try_from("localhost").unwrap();
    connector.connect(name, stream).await
}
