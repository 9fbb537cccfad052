//! Lichess OAuth protocol support.
//!
//! This module contains only endpoint constants, URL/form builders, response
//! types, and JSON parsing. No HTTP calls — those live in the server's
//! `lichess` adapter.

use serde::Deserialize;

use crate::{AuthError, pkce::Challenge};

pub const AUTHORIZE_URL: &str = "https://lichess.org/oauth";

/// Default API base. The server's HTTP adapter takes the base as a
/// parameter so tests can point it at a local double.
pub const API_BASE: &str = "https://lichess.org";
pub const TOKEN_PATH: &str = "/api/token";
pub const ACCOUNT_PATH: &str = "/api/account";

/// Default scope: enough to play via the board API.
pub const DEFAULT_SCOPE: &str = "board:play";

/// Response from the token-exchange endpoint. Only `access_token` is
/// guaranteed; everything else varies by grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<i64>,
}

/// Stable identity derived from the `/api/account` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub title: Option<String>,
}

/// Build the authorize URL the browser is redirected to.
pub fn build_authorize_url(
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    challenge: &Challenge,
) -> String {
    format!(
        "{AUTHORIZE_URL}?response_type=code&client_id={}&redirect_uri={}&scope={}&code_challenge_method=S256&code_challenge={}&state={}",
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
        // Already base64url, but encode anyway for uniformity.
        urlencoding::encode(&challenge.code_challenge),
        urlencoding::encode(&challenge.state),
    )
}

/// Token-exchange request as x-www-form-urlencoded pairs.
///
/// Lichess is a public PKCE client: no client_secret, the code_verifier is
/// what proves possession of the original authorize request.
pub fn token_request_form(
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
    client_id: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "authorization_code".into()),
        ("code", code.into()),
        ("redirect_uri", redirect_uri.into()),
        ("client_id", client_id.into()),
        ("code_verifier", code_verifier.into()),
    ]
}

/// Extract a stable identity from the account response.
///
/// Tolerates minor response-shape variation: the user id falls back
/// `id` → `user.id` → `username`, and the display name `username` → `name`.
/// The id may arrive as a number or a string depending on endpoint version.
pub fn extract_identity(account: &serde_json::Value) -> Result<Identity, AuthError> {
    let id = json_id(&account["id"])
        .or_else(|| json_id(&account["user"]["id"]))
        .or_else(|| json_id(&account["username"]))
        .ok_or(AuthError::Profile)?;

    let username = account["username"]
        .as_str()
        .or_else(|| account["name"].as_str())
        .unwrap_or("unknown")
        .to_string();

    let title = account["title"].as_str().map(str::to_string);

    Ok(Identity {
        id,
        username,
        title,
    })
}

fn json_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::pkce::Challenge;

    use super::{build_authorize_url, extract_identity, token_request_form};

    fn challenge() -> Challenge {
        Challenge {
            state: "state-123".into(),
            code_verifier: "ab".repeat(32),
            code_challenge: "challenge-xyz".into(),
        }
    }

    #[test]
    fn authorize_url_carries_all_pkce_parameters() {
        let url = build_authorize_url(
            "boardside",
            "http://localhost:3000/oauth/callback",
            "board:play",
            &challenge(),
        );
        assert!(url.starts_with("https://lichess.org/oauth?response_type=code"));
        assert!(url.contains("client_id=boardside"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Foauth%2Fcallback"));
        assert!(url.contains("scope=board%3Aplay"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("code_challenge=challenge-xyz"));
        assert!(url.contains("state=state-123"));
    }

    #[test]
    fn token_form_contains_verifier_and_no_secret() {
        let form = token_request_form("code-1", "verifier-1", "http://cb", "boardside");
        let keys: Vec<&str> = form.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            ["grant_type", "code", "redirect_uri", "client_id", "code_verifier"]
        );
        assert!(form.iter().any(|(k, v)| *k == "grant_type" && v == "authorization_code"));
        assert!(form.iter().any(|(k, v)| *k == "code_verifier" && v == "verifier-1"));
    }

    #[test]
    fn identity_prefers_top_level_id() {
        let account = serde_json::json!({
            "id": "thib", "username": "thibault", "title": "GM",
            "user": {"id": "nested"}
        });
        let identity = extract_identity(&account).expect("identity");
        assert_eq!(identity.id, "thib");
        assert_eq!(identity.username, "thibault");
        assert_eq!(identity.title.as_deref(), Some("GM"));
    }

    #[test]
    fn identity_falls_back_to_nested_then_username() {
        let nested = serde_json::json!({"user": {"id": 42}, "username": "someone"});
        assert_eq!(extract_identity(&nested).expect("identity").id, "42");

        let bare = serde_json::json!({"username": "someone"});
        let identity = extract_identity(&bare).expect("identity");
        assert_eq!(identity.id, "someone");
        assert_eq!(identity.username, "someone");
        assert_eq!(identity.title, None);
    }

    #[test]
    fn identity_rejects_response_without_identifier() {
        let empty = serde_json::json!({"name": "display only"});
        assert!(extract_identity(&empty).is_err());
    }
}
