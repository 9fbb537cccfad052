//! PKCE challenge generation (RFC 7636, S256 method).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::AuthError;

/// One login attempt's worth of PKCE material.
///
/// `state` and `code_verifier` travel to the client inside the signed pkce
/// cookie; `code_challenge` goes to Lichess in the authorize URL. Lichess
/// only sees the raw verifier at token-exchange time, which binds the two
/// requests together without any server-side state.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

/// Generate a fresh `(state, code_verifier, code_challenge)` triple.
///
/// `state` is a v4 UUID (unguessable, unique per attempt); the verifier is
/// 32 CSPRNG bytes hex-encoded, giving 256 bits of entropy.
pub fn generate() -> Result<Challenge, AuthError> {
    let state = Uuid::new_v4().to_string();

    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| AuthError::Rng(e.to_string()))?;
    let code_verifier = hex::encode(bytes);

    let code_challenge = derive_challenge(&code_verifier);

    Ok(Challenge {
        state,
        code_verifier,
        code_challenge,
    })
}

/// S256: base64url(SHA-256(verifier)) without padding.
pub fn derive_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use sha2::{Digest, Sha256};

    use super::{derive_challenge, generate};

    #[test]
    fn challenge_is_unpadded_base64url_of_sha256() {
        let challenge = derive_challenge("some-verifier");
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(b"some-verifier"));
        assert_eq!(challenge, expected);
        assert!(!challenge.contains('='));
        assert!(!challenge.contains('+'));
        assert!(!challenge.contains('/'));
    }

    #[test]
    fn generated_triple_is_internally_consistent() {
        let c = generate().expect("rng available");
        assert_eq!(c.code_challenge, derive_challenge(&c.code_verifier));
        // 32 bytes hex-encoded
        assert_eq!(c.code_verifier.len(), 64);
        assert!(c.code_verifier.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn successive_attempts_never_collide() {
        let a = generate().expect("rng available");
        let b = generate().expect("rng available");
        assert_ne!(a.state, b.state);
        assert_ne!(a.code_verifier, b.code_verifier);
        assert_ne!(a.code_challenge, b.code_challenge);
    }
}
