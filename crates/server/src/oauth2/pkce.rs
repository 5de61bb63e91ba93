//! PKCE (RFC 7636) verification.

use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// `code_challenge_method` values accepted by the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
    Plain,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }

    /// Parse a method name. Matching is exact: `s256` is not `S256`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// BASE64URL-NOPAD(SHA256(verifier))
pub fn s256_challenge(code_verifier: &str) -> String {
    let hash = Sha256::digest(code_verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}

/// Check a `code_verifier` against the challenge stored with the code.
///
/// `method` is the raw stored method string; anything other than `S256` or
/// `plain` never verifies.
pub fn verify_code_verifier(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    let computed = match CodeChallengeMethod::parse(method) {
        Some(CodeChallengeMethod::S256) => s256_challenge(code_verifier),
        Some(CodeChallengeMethod::Plain) => code_verifier.to_string(),
        None => return false,
    };
    computed.as_bytes().ct_eq(code_challenge.as_bytes()).into()
}
