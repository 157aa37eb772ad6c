//! Certificate validation chain.
//!
//! Compares a presented certificate against a reference certificate through
//! an ordered list of pure checks, stopping at the first failure.
//!
//! # Default order
//! ```text
//! ContentMatch → Equals → Length
//! ```
//!
//! ContentMatch is bounded: encodings of different length fail immediately
//! instead of indexing past the shorter one. Length stays in the default
//! chain so custom orderings keep the same guard.

use std::fmt;
use std::sync::Arc;

use crate::security::certificate::Certificate;

/// The two certificates being compared.
#[derive(Debug, Clone, Copy)]
pub struct CertificatePair<'a> {
    pub presented: &'a Certificate,
    pub reference: &'a Certificate,
}

impl<'a> CertificatePair<'a> {
    pub fn new(presented: &'a Certificate, reference: &'a Certificate) -> Self {
        Self {
            presented,
            reference,
        }
    }

    pub fn presented_der(&self) -> &'a [u8] {
        self.presented.as_der()
    }

    pub fn reference_der(&self) -> &'a [u8] {
        self.reference.as_der()
    }
}

/// Caller-supplied predicate for [`CertificateCheck::Custom`].
pub type CheckFn = Arc<dyn Fn(&CertificatePair<'_>) -> bool + Send + Sync>;

/// One member of a validation chain.
#[derive(Clone)]
pub enum CertificateCheck {
    /// Byte-for-byte equality of the DER encodings.
    ContentMatch,
    /// Same issuer and serial number.
    Equals,
    /// Same encoded length.
    Length,
    Custom { name: &'static str, check: CheckFn },
}

impl CertificateCheck {
    pub fn custom(
        name: &'static str,
        check: impl Fn(&CertificatePair<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        CertificateCheck::Custom {
            name,
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CertificateCheck::ContentMatch => "content_match",
            CertificateCheck::Equals => "equals",
            CertificateCheck::Length => "length",
            CertificateCheck::Custom { name, .. } => name,
        }
    }

    /// Evaluate this check against a pair.
    pub fn passes(&self, pair: &CertificatePair<'_>) -> bool {
        match self {
            CertificateCheck::ContentMatch => content_match(pair),
            CertificateCheck::Equals => equals(pair),
            CertificateCheck::Length => pair.presented_der().len() == pair.reference_der().len(),
            CertificateCheck::Custom { check, .. } => check(pair),
        }
    }
}

impl fmt::Debug for CertificateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn content_match(pair: &CertificatePair<'_>) -> bool {
    let (presented, reference) = (pair.presented_der(), pair.reference_der());
    if presented.len() != reference.len() {
        return false;
    }
    presented.iter().zip(reference).all(|(a, b)| a == b)
}

// Issuer DN + serial when both parse as X.509, raw DER equality otherwise.
fn equals(pair: &CertificatePair<'_>) -> bool {
    match (
        pair.presented.issuer_and_serial(),
        pair.reference.issuer_and_serial(),
    ) {
        (Some(presented), Some(reference)) => presented == reference,
        _ => pair.presented_der() == pair.reference_der(),
    }
}

/// Ordered, immutable sequence of certificate checks.
///
/// Holds no mutable state; share it freely behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CertificateValidationChain {
    checks: Vec<CertificateCheck>,
}

impl Default for CertificateValidationChain {
    fn default() -> Self {
        Self {
            checks: vec![
                CertificateCheck::ContentMatch,
                CertificateCheck::Equals,
                CertificateCheck::Length,
            ],
        }
    }
}

impl CertificateValidationChain {
    /// Start an empty chain.
    pub fn builder() -> ChainBuilder {
        ChainBuilder { checks: Vec::new() }
    }

    pub fn checks(&self) -> &[CertificateCheck] {
        &self.checks
    }

    /// `true` only if every check passes.
    pub fn check(&self, presented: &Certificate, reference: &Certificate) -> bool {
        self.failing_check(presented, reference).is_none()
    }

    /// The first check that rejects the pair, if any.
    pub fn failing_check(
        &self,
        presented: &Certificate,
        reference: &Certificate,
    ) -> Option<&CertificateCheck> {
        let pair = CertificatePair::new(presented, reference);
        self.checks.iter().find(|check| !check.passes(&pair))
    }
}

/// Builder for a custom check order.
#[derive(Debug)]
pub struct ChainBuilder {
    checks: Vec<CertificateCheck>,
}

impl ChainBuilder {
    pub fn then(mut self, check: CertificateCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn build(self) -> CertificateValidationChain {
        CertificateValidationChain {
            checks: self.checks,
        }
    }
}
