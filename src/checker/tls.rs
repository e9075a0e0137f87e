// src/checker/tls.rs
// =============================================================================
// Recognises TLS failure signatures in request errors.
//
// reqwest wraps the underlying TLS error several layers deep, so we flatten
// the whole `source()` chain into one lowercase string and look for known
// substrings. Order matters: the specific signatures (legacy renegotiation,
// handshake failure) are checked before the generic "something TLS-ish".
// =============================================================================

use std::error::Error as StdError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsFailure {
    /// Server insists on insecure legacy renegotiation. Terminal.
    LegacyRenegotiation,
    /// Server aborted the handshake. Terminal.
    HandshakeFailure,
    /// Trust / verification problem. Worth one retry without verification.
    Verification,
}

const LEGACY_SIGNATURES: &[&str] = &[
    "unsafe legacy renegotiation",
    "unsafe_legacy_renegotiation",
    "legacy renegotiation",
];

const HANDSHAKE_SIGNATURES: &[&str] = &[
    "handshake failure",
    "handshake_failure",
    "handshakefailure",
];

const GENERIC_SIGNATURES: &[&str] = &["certificate", "tls", "ssl"];

// Joins an error and all of its sources into one string
pub fn error_chain_text(error: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

// Classifies an error signature, None when it is not TLS related
pub fn classify(signature: &str) -> Option<TlsFailure> {
    let text = signature.to_lowercase();

    if LEGACY_SIGNATURES.iter().any(|s| text.contains(s)) {
        Some(TlsFailure::LegacyRenegotiation)
    } else if HANDSHAKE_SIGNATURES.iter().any(|s| text.contains(s)) {
        Some(TlsFailure::HandshakeFailure)
    } else if GENERIC_SIGNATURES.iter().any(|s| text.contains(s)) {
        Some(TlsFailure::Verification)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Layer {
        msg: &'static str,
        inner: Option<Box<Layer>>,
    }

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl StdError for Layer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.inner.as_deref().map(|l| l as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn test_chain_text_includes_sources() {
        let err = Layer {
            msg: "error sending request",
            inner: Some(Box::new(Layer {
                msg: "received fatal alert: HandshakeFailure",
                inner: None,
            })),
        };
        let text = error_chain_text(&err);
        assert_eq!(text, "error sending request: received fatal alert: HandshakeFailure");
        assert_eq!(classify(&text), Some(TlsFailure::HandshakeFailure));
    }

    #[test]
    fn test_legacy_wins_over_handshake() {
        let sig = "[SSL: UNSAFE_LEGACY_RENEGOTIATION_DISABLED] handshake failure";
        assert_eq!(classify(sig), Some(TlsFailure::LegacyRenegotiation));
    }

    #[test]
    fn test_generic_certificate_problem() {
        let sig = "invalid peer certificate: UnknownIssuer";
        assert_eq!(classify(sig), Some(TlsFailure::Verification));
    }

    #[test]
    fn test_non_tls_error() {
        assert_eq!(classify("dns error: failed to lookup address"), None);
        assert_eq!(classify("operation timed out"), None);
    }
}
