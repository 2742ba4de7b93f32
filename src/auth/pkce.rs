//! Proof Key for Code Exchange, as in RFC 7636.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Secrets of one authorization attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct Pkce {
    /// Sent only with the token exchange.
    pub verifier: String,
    /// Sent with the authorization request.
    pub challenge: String,
    /// Echoed back on the redirect to tie it to this attempt.
    pub state: String,
}

impl Pkce {
    pub const VERIFIER_LENGTH: usize = 64;
    pub const STATE_LENGTH: usize = 16;

    #[must_use]
    pub fn generate() -> Self {
        let verifier = random_string(Self::VERIFIER_LENGTH);
        Self {
            challenge: challenge(&verifier),
            verifier,
            state: random_string(Self::STATE_LENGTH),
        }
    }
}

/// Alphanumeric string from the thread-local CSPRNG.
#[must_use]
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// The `S256` code challenge of `verifier`.
#[must_use]
pub fn challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
