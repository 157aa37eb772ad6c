//! In-place TLS upgrade of a transport socket.
//!
//! # Handshake state machine
//! ```text
//! NotStarted → InFlight → Secured   (terminal)
//!                       → Failed    (terminal, also on cancellation)
//! ```
//!
//! # Design Decisions
//! - The socket negotiates in the server role with its own identity certificate
//! - Client certificates are requested, never required
//! - Each presented client certificate goes to the injected hook; the hook's
//!   verdict is advisory and the transport accepts the certificate regardless
//! - Possession of the client key is still proven (handshake signatures are verified)
//! - The stream swap happens under both stream locks, so sends queued behind
//!   the handshake go out over the secured stream

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::ServerConfig;
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme, SupportedProtocolVersion};
use serde::{Deserialize, Serialize};
use tokio_rustls::TlsAcceptor;

use crate::net::connection::ConnectionIdentity;
use crate::net::error::TransportError;
use crate::net::outcome::{deliver, Outcome};
use crate::net::socket::TransportSocket;
use crate::net::stream::ConnectionStream;
use crate::observability::metrics;
use crate::security::certificate::Certificate;
use crate::security::identity::ServerIdentity;

/// Crypto provider used for every handshake.
pub(crate) fn crypto_provider() -> CryptoProvider {
    rustls::crypto::ring::default_provider()
}

/// Secure-transport protocol versions a caller may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TlsProtocol {
    #[serde(rename = "tls1.2")]
    Tls12,
    #[serde(rename = "tls1.3")]
    Tls13,
}

impl TlsProtocol {
    pub const ALL: [TlsProtocol; 2] = [TlsProtocol::Tls12, TlsProtocol::Tls13];

    fn version(self) -> &'static SupportedProtocolVersion {
        match self {
            TlsProtocol::Tls12 => &rustls::version::TLS12,
            TlsProtocol::Tls13 => &rustls::version::TLS13,
        }
    }

    fn from_rustls(version: rustls::ProtocolVersion) -> Option<Self> {
        match version {
            rustls::ProtocolVersion::TLSv1_2 => Some(TlsProtocol::Tls12),
            rustls::ProtocolVersion::TLSv1_3 => Some(TlsProtocol::Tls13),
            _ => None,
        }
    }
}

impl fmt::Display for TlsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsProtocol::Tls12 => f.write_str("tls1.2"),
            TlsProtocol::Tls13 => f.write_str("tls1.3"),
        }
    }
}

/// Progress of a socket's TLS upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    NotStarted,
    InFlight,
    Secured,
    Failed,
}

/// A client certificate surfaced during a handshake.
#[derive(Debug, Clone)]
pub struct ClientCertificateEvent {
    /// End-entity certificate presented by the peer.
    pub certificate: Certificate,
    /// Intermediates sent along with it, in the order received.
    pub intermediates: Vec<Certificate>,
    pub connection: ConnectionIdentity,
}

/// Receives every client certificate presented during a handshake.
///
/// The return value is advisory: it is logged and counted, but the handshake
/// proceeds either way. Rejection belongs to the layer above.
pub trait ClientCertificateHook: Send + Sync {
    fn on_client_certificate(&self, event: &ClientCertificateEvent) -> bool;
}

impl<F> ClientCertificateHook for F
where
    F: Fn(&ClientCertificateEvent) -> bool + Send + Sync,
{
    fn on_client_certificate(&self, event: &ClientCertificateEvent) -> bool {
        self(event)
    }
}

/// Hook that only records the presentation in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl ClientCertificateHook for LoggingHook {
    fn on_client_certificate(&self, event: &ClientCertificateEvent) -> bool {
        tracing::info!(
            connection = %event.connection,
            fingerprint = %event.certificate.fingerprint_sha256(),
            intermediates = event.intermediates.len(),
            "Client certificate presented"
        );
        true
    }
}

/// Facts about a freshly secured session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub protocol: Option<TlsProtocol>,
    pub cipher_suite: Option<String>,
    /// SNI sent by the client, if any.
    pub server_name: Option<String>,
    pub client_certificate: Option<Certificate>,
}

/// Upgrades plaintext transport sockets to TLS in the server role.
#[derive(Clone)]
pub struct TlsUpgrader {
    hook: Arc<dyn ClientCertificateHook>,
}

impl Default for TlsUpgrader {
    fn default() -> Self {
        Self::new(LoggingHook)
    }
}

impl fmt::Debug for TlsUpgrader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsUpgrader").finish_non_exhaustive()
    }
}

impl TlsUpgrader {
    pub fn new(hook: impl ClientCertificateHook + 'static) -> Self {
        Self {
            hook: Arc::new(hook),
        }
    }

    pub fn with_shared_hook(hook: Arc<dyn ClientCertificateHook>) -> Self {
        Self { hook }
    }

    /// Replace `socket`'s plaintext stream with a TLS stream.
    ///
    /// Resolves once with the handshake's single terminal outcome. A socket
    /// is upgraded at most once; any further call fails with
    /// [`TransportError::InvalidHandshakeState`].
    pub async fn authenticate(
        &self,
        socket: &TransportSocket,
        enabled_protocols: &[TlsProtocol],
    ) -> Result<Outcome<SessionInfo>, TransportError> {
        if socket.scope().is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        if enabled_protocols.is_empty() {
            return Err(TransportError::NoProtocols);
        }
        let identity = socket.identity().ok_or(TransportError::MissingIdentity)?;
        let config = self.server_config(&identity, enabled_protocols, socket.connection_identity())?;

        if socket.begin_handshake()?.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let result = self.handshake(socket, config).await;

        let state = match &result {
            Ok(Outcome::Completed(_)) => HandshakeState::Secured,
            _ => HandshakeState::Failed,
        };
        socket.set_handshake_state(state);

        match &result {
            Ok(Outcome::Completed(session)) => {
                metrics::record_handshake("secured");
                tracing::debug!(
                    connection_id = %socket.id(),
                    protocol = ?session.protocol,
                    cipher_suite = ?session.cipher_suite,
                    client_certificate = session.client_certificate.is_some(),
                    "TLS handshake complete"
                );
            }
            Ok(Outcome::Cancelled) => {
                metrics::record_handshake("cancelled");
                tracing::debug!(connection_id = %socket.id(), "TLS handshake cancelled");
            }
            Err(e) => {
                metrics::record_handshake("failed");
                tracing::warn!(connection_id = %socket.id(), error = %e, "TLS handshake failed");
            }
        }
        result
    }

    /// Callback form of [`authenticate`](Self::authenticate).
    ///
    /// `on_success` runs once on success, `on_error` at most once with the
    /// causing fault; cancellation runs neither. Returns `true` if a callback ran.
    pub async fn authenticate_with<S, E>(
        &self,
        socket: &TransportSocket,
        enabled_protocols: &[TlsProtocol],
        on_success: S,
        on_error: E,
    ) -> bool
    where
        S: FnOnce(SessionInfo),
        E: FnOnce(TransportError),
    {
        let result = self.authenticate(socket, enabled_protocols).await;
        deliver(result, on_success, on_error)
    }

    async fn handshake(
        &self,
        socket: &TransportSocket,
        config: ServerConfig,
    ) -> Result<Outcome<SessionInfo>, TransportError> {
        let (mut writer, mut reader) = socket.streams().lock_both().await;
        let plain = match (reader.take(), writer.take()) {
            (Some(r), Some(w)) => match r.unsplit(w) {
                ConnectionStream::Plain(tcp) => tcp,
                secured @ ConnectionStream::Secured(_) => {
                    let (r, w) = tokio::io::split(secured);
                    *reader = Some(r);
                    *writer = Some(w);
                    return Err(TransportError::InvalidHandshakeState(HandshakeState::Secured));
                }
            },
            _ if socket.scope().is_cancelled() => return Ok(Outcome::Cancelled),
            _ => return Err(TransportError::NotConnected),
        };

        let acceptor = TlsAcceptor::from(Arc::new(config));
        let outcome = socket
            .scope()
            .guard(acceptor.accept(plain))
            .await
            .map_err(TransportError::Handshake)?;

        let tls = match outcome {
            Outcome::Completed(tls) => tls,
            Outcome::Cancelled => return Ok(Outcome::Cancelled),
        };
        // Close may have started while the handshake finished.
        if socket.scope().is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let session = session_info(&tls);
        let (r, w) = tokio::io::split(ConnectionStream::Secured(Box::new(tls)));
        *reader = Some(r);
        *writer = Some(w);
        Ok(Outcome::Completed(session))
    }

    fn server_config(
        &self,
        identity: &ServerIdentity,
        protocols: &[TlsProtocol],
        connection: ConnectionIdentity,
    ) -> Result<ServerConfig, TransportError> {
        let provider = Arc::new(crypto_provider());
        let verifier = ObservingClientVerifier {
            connection,
            hook: self.hook.clone(),
            algorithms: provider.signature_verification_algorithms,
        };
        let versions: Vec<&'static SupportedProtocolVersion> =
            protocols.iter().map(|p| p.version()).collect();

        let config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)
            .map_err(TransportError::TlsConfig)?
            .with_client_cert_verifier(Arc::new(verifier))
            .with_cert_resolver(identity.resolver());
        Ok(config)
    }
}

fn session_info(tls: &tokio_rustls::server::TlsStream<tokio::net::TcpStream>) -> SessionInfo {
    let (_, conn) = tls.get_ref();
    SessionInfo {
        protocol: conn.protocol_version().and_then(TlsProtocol::from_rustls),
        cipher_suite: conn
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite())),
        server_name: conn.server_name().map(str::to_owned),
        client_certificate: conn
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|der| Certificate::from(der.clone())),
    }
}

/// Client verifier that reports to the hook and accepts every certificate.
struct ObservingClientVerifier {
    connection: ConnectionIdentity,
    hook: Arc<dyn ClientCertificateHook>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl fmt::Debug for ObservingClientVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservingClientVerifier")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl ClientCertVerifier for ObservingClientVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        let event = ClientCertificateEvent {
            certificate: Certificate::from(end_entity.clone()),
            intermediates: intermediates
                .iter()
                .map(|der| Certificate::from(der.clone()))
                .collect(),
            connection: self.connection,
        };
        let accepted = self.hook.on_client_certificate(&event);
        metrics::record_client_certificate(accepted);
        if !accepted {
            tracing::debug!(
                connection = %self.connection,
                "Client certificate flagged by hook; deferring to application layer"
            );
        }
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
