//! Signed-cookie codec.
//!
//! Tokens are tamper-evident, not confidential: the payload is visible to
//! the client but unforgeable without the server secret. The wire format is
//! `base64(json(payload)) "." base64(hmac_sha256(body, secret))`. The `.`
//! separator is outside the base64 alphabet, so splitting on the *last*
//! occurrence is unambiguous even though `.` could appear in a malicious
//! input body.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// In-flight login attempt, held only inside the signed `pkce` cookie.
/// There is no server-side table of attempts; the signature on this payload
/// is the sole defense against forged callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkceAttempt {
    pub state: String,
    pub code_verifier: String,
}

/// Payload of the signed `session` cookie.
///
/// Short field names keep the cookie small; `sid` is the session row id,
/// `uid` the user row id, `u` the username at login time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub sid: String,
    pub uid: String,
    pub u: String,
}

/// Sign a payload into a `body.tag` token.
///
/// Deterministic for a given payload and secret; any randomness comes from
/// the payload itself.
pub fn sign<T: Serialize>(payload: &T, secret: &str) -> String {
    let json = serde_json::to_vec(payload).expect("cookie payloads are plain structs");
    let body = STANDARD.encode(json);
    let tag = STANDARD.encode(hmac_tag(secret, body.as_bytes()));
    format!("{body}.{tag}")
}

/// Verify a token and decode its payload.
///
/// Returns `None` on any failure: missing separator, tag mismatch, invalid
/// base64, or a payload that does not decode into `T` (malformed-but-signed
/// payloads fail closed). Callers must treat `None` exactly like "no cookie".
pub fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    let (body, tag) = token.rsplit_once('.')?;
    let tag = STANDARD.decode(tag).ok()?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(body.as_bytes());
    // Constant-time comparison
    mac.verify_slice(&tag).ok()?;

    let json = STANDARD.decode(body).ok()?;
    serde_json::from_slice(&json).ok()
}

fn hmac_tag(secret: &str, data: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
