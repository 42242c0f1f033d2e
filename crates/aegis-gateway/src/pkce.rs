//! Proof Key for Code Exchange (RFC 7636)
//!
//! Stateless helpers binding an authorization code to its original requester
//! via the challenge/verifier pair. The challenge comparison is constant-time
//! to keep redemption free of timing side channels.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Minimum verifier length per RFC 7636 §4.1.
pub const MIN_CODE_VERIFIER_LENGTH: usize = 43;
/// Maximum verifier length per RFC 7636 §4.1.
pub const MAX_CODE_VERIFIER_LENGTH: usize = 128;

/// Whether `verifier` satisfies the RFC 7636 charset and length policy:
/// unreserved characters `[A-Za-z0-9-._~]`, length within `[43, 128]`.
#[must_use]
pub fn valid_code_verifier(verifier: &str) -> bool {
    if verifier.len() < MIN_CODE_VERIFIER_LENGTH || verifier.len() > MAX_CODE_VERIFIER_LENGTH {
        return false;
    }
    verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
}

/// `base64url(SHA-256(verifier))` without padding, the S256 challenge
/// transformation of RFC 7636 §4.2.
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Constant-time equality between a computed challenge value and the stored
/// `code_challenge`.
#[must_use]
pub fn challenge_matches(computed: &str, stored: &str) -> bool {
    bool::from(computed.as_bytes().ct_eq(stored.as_bytes()))
}
