//! Properties of the default certificate validation chain.

use proptest::prelude::*;

use ws_transport::security::{Certificate, CertificateValidationChain};

mod common;

fn encoding() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

proptest! {
    #[test]
    fn identical_encodings_pass(der in encoding()) {
        let chain = CertificateValidationChain::default();
        let presented = Certificate::from_der(der.clone());
        let reference = Certificate::from_der(der);
        prop_assert!(chain.check(&presented, &reference));
    }

    #[test]
    fn length_mismatch_fails_either_way(der in encoding(), extra in prop::collection::vec(any::<u8>(), 1..64)) {
        let chain = CertificateValidationChain::default();
        let short = Certificate::from_der(der.clone());
        let mut longer = der;
        longer.extend(extra);
        let long = Certificate::from_der(longer);

        prop_assert!(!chain.check(&short, &long));
        prop_assert!(!chain.check(&long, &short));
    }

    #[test]
    fn single_byte_difference_fails(
        der in prop::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let chain = CertificateValidationChain::default();
        let mut altered = der.clone();
        let i = index.index(altered.len());
        altered[i] ^= flip;

        let presented = Certificate::from_der(altered);
        let reference = Certificate::from_der(der);
        prop_assert!(!chain.check(&presented, &reference));
    }
}

#[test]
fn generated_certificate_matches_itself_only() {
    let chain = CertificateValidationChain::default();
    let first = common::TestCert::generate("a.test").certificate();
    let second = common::TestCert::generate("b.test").certificate();

    assert!(chain.check(&first, &first.clone()));
    assert!(!chain.check(&first, &second));
}
