//! HTTP adapter for the Lichess API.
//!
//! The protocol itself (URLs, forms, parsing) lives in `boardside-auth`;
//! this module only performs the network calls.

use boardside_auth::lichess::{self, TokenResponse};
use url::Url;

/// Failures talking to Lichess. The upstream status code is preserved so a
/// failed login is diagnosable from logs; OAuth codes are single-use, so no
/// retry is ever attempted.
#[derive(Debug, thiserror::Error)]
pub enum LichessError {
    #[error("lichess {what} returned status {status}")]
    Status { what: &'static str, status: u16 },

    #[error("lichess {what} request failed: {source}")]
    Transport {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("lichess {what} response could not be decoded: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Thin wrapper over a shared `reqwest::Client`.
#[derive(Clone)]
pub struct Lichess {
    http: reqwest::Client,
    api_base: String,
}

impl Default for Lichess {
    fn default() -> Self {
        Self::new()
    }
}

impl Lichess {
    pub fn new() -> Self {
        Self::with_api_base(lichess::API_BASE)
    }

    /// Point the adapter at a different API base (tests use a local double).
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Exchange an authorization code (plus the PKCE verifier) for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
        client_id: &str,
    ) -> Result<TokenResponse, LichessError> {
        let what = "token exchange";
        let resp = self
            .http
            .post(self.url(lichess::TOKEN_PATH))
            .form(&lichess::token_request_form(
                code,
                code_verifier,
                redirect_uri,
                client_id,
            ))
            .send()
            .await
            .map_err(|source| LichessError::Transport { what, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LichessError::Status {
                what,
                status: status.as_u16(),
            });
        }

        resp.json::<TokenResponse>()
            .await
            .map_err(|source| LichessError::Decode { what, source })
    }

    /// Fetch the authenticated account profile as raw JSON. The shape varies
    /// slightly between endpoint versions, so identity extraction happens
    /// downstream via `lichess::extract_identity`.
    pub async fn fetch_account(
        &self,
        access_token: &str,
    ) -> Result<serde_json::Value, LichessError> {
        let what = "account fetch";
        let resp = self
            .http
            .get(self.url(lichess::ACCOUNT_PATH))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| LichessError::Transport { what, source })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LichessError::Status {
                what,
                status: status.as_u16(),
            });
        }

        resp.json().await.map_err(|source| LichessError::Decode { what, source })
    }

    /// Relay a GET to an already-validated lichess.org URL, returning the
    /// upstream status, content type, and body as-is.
    pub async fn proxy_get(
        &self,
        url: &Url,
    ) -> Result<(u16, Option<String>, Vec<u8>), LichessError> {
        let what = "proxy fetch";
        let resp = self
            .http
            .get(url.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| LichessError::Transport { what, source })?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .map_err(|source| LichessError::Decode { what, source })?;
        Ok((status, content_type, body.to_vec()))
    }
}
