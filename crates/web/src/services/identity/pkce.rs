//! PKCE helpers (RFC 7636, `S256` method).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of generated verifiers; RFC 7636 allows 43..=128.
pub const VERIFIER_LENGTH: usize = 64;

/// Unreserved characters allowed in a verifier.
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Generate a random string drawn from the verifier charset.
#[must_use]
pub fn random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            char::from(CHARSET.get(idx).copied().unwrap_or(b'A'))
        })
        .collect()
}

/// Generate a fresh code verifier.
#[must_use]
pub fn generate_verifier() -> String {
    random_string(VERIFIER_LENGTH)
}

/// Derive the `S256` code challenge for a verifier.
#[must_use]
pub fn challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
