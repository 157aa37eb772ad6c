//! Certificate security subsystem.
//!
//! # Data Flow
//! ```text
//! Handshake presents client certificate
//!     → net::tls hook (ClientCertificateEvent)
//!     → pinning.rs (optional reference comparison)
//!     → validation.rs (ContentMatch → Equals → Length)
//!     → advisory verdict: logged + counted, handshake continues
//! ```
//!
//! # Design Decisions
//! - Checks are pure values; the chain holds no mutable state
//! - Identity and reference certificates are immutable and shared
//! - Policy enforcement belongs to the application layer

pub mod certificate;
pub mod identity;
pub mod pinning;
pub mod validation;

pub use certificate::Certificate;
pub use identity::{load_certificate, IdentityError, ServerIdentity};
pub use pinning::PinnedCertificateHook;
pub use validation::{CertificateCheck, CertificatePair, CertificateValidationChain};
