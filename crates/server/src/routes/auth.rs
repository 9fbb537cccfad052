//! Login, OAuth callback, session resolution, and logout.
//!
//! The flow keeps no server-side record of in-flight login attempts: the
//! signed `pkce` cookie *is* the state, and its signature is what a forged
//! callback cannot produce.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts, Query, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{AppendHeaders, IntoResponse, Response},
};
use chrono::{Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use boardside_auth::{
    lichess, pkce,
    token::{self, PkceAttempt, SessionToken},
};

use crate::cookies;
use crate::error::ApiErr;
use crate::storage::{Db, NewSession, SessionUser};
use crate::{AppConfig, AppState};

const PROVIDER: &str = "lichess";

// ---------------------------------------------------------------------------
// Session resolver
// ---------------------------------------------------------------------------

/// The caller's identity, if any. Absent cookie, bad signature, and a
/// deleted session row all resolve to `None` — never an error response.
pub struct MaybeUser(pub Option<SessionUser>);

/// Recover the caller's identity from the `session` cookie.
pub fn resolve_session(db: &Db, secret: &str, headers: &HeaderMap) -> Option<SessionUser> {
    let raw = cookies::parse(headers).remove(cookies::SESSION_COOKIE)?;
    let claim: SessionToken = token::verify(&raw, secret)?;
    match db.get_session_with_user(&claim.sid) {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("session lookup: {e}");
            None
        }
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Db::from_ref(state);
        let config = AppConfig::from_ref(state);
        Ok(MaybeUser(resolve_session(
            &db,
            &config.session_secret,
            &parts.headers,
        )))
    }
}

// ---------------------------------------------------------------------------
// GET /login — redirect to the Lichess authorize page
// ---------------------------------------------------------------------------

/// GET /login — start a PKCE login attempt.
pub async fn login(State(config): State<AppConfig>) -> Result<Response, ApiErr> {
    if config.client_id.is_empty() || config.session_secret.is_empty() {
        return Err(ApiErr::unavailable("Lichess OAuth not configured"));
    }

    let challenge = pkce::generate().map_err(|e| {
        tracing::error!("pkce generation: {e}");
        ApiErr::internal("internal server error")
    })?;
    let url = lichess::build_authorize_url(
        &config.client_id,
        &config.redirect_uri,
        &config.scope,
        &challenge,
    );

    let attempt = PkceAttempt {
        state: challenge.state,
        code_verifier: challenge.code_verifier,
    };
    let pkce_cookie = cookies::set(
        cookies::PKCE_COOKIE,
        &token::sign(&attempt, &config.session_secret),
        cookies::PKCE_MAX_AGE,
    );

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, url), (header::SET_COOKIE, pkce_cookie)],
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// GET /oauth/callback — complete the login
// ---------------------------------------------------------------------------

/// GET /oauth/callback?code=&state= — validate the attempt, exchange the
/// code, establish a session.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ApiErr> {
    let config = &state.config;
    if config.client_id.is_empty() || config.session_secret.is_empty() {
        return Err(ApiErr::unavailable("Lichess OAuth not configured"));
    }

    let Some(code) = params.get("code") else {
        return Ok((StatusCode::BAD_REQUEST, "missing code").into_response());
    };

    let attempt: PkceAttempt = cookies::parse(&headers)
        .get(cookies::PKCE_COOKIE)
        .and_then(|raw| token::verify(raw, &config.session_secret))
        .ok_or_else(|| ApiErr::bad_request("missing pkce cookie"))?;

    // Exact string equality against the signed cookie is the sole defense
    // against cross-attempt and forged callbacks.
    let returned_state = params.get("state").map(String::as_str).unwrap_or("");
    if returned_state != attempt.state {
        return Err(ApiErr::bad_request("state mismatch"));
    }

    let tokens = state
        .lichess
        .exchange_code(
            code,
            &attempt.code_verifier,
            &config.redirect_uri,
            &config.client_id,
        )
        .await?;

    let account = state.lichess.fetch_account(&tokens.access_token).await?;
    let identity = lichess::extract_identity(&account).map_err(|e| {
        tracing::error!("account parse: {e}");
        ApiErr::bad_gateway("lichess account response had no identifier")
    })?;

    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    state
        .db
        .upsert_user(
            &identity.id,
            &identity.username,
            identity.title.as_deref(),
            &created_at,
        )
        .map_err(ApiErr::from_db("user upsert"))?;

    let session_id = Uuid::new_v4().to_string();
    let expires_at = tokens
        .expires_in
        .map(|secs| (Utc::now() + Duration::seconds(secs)).to_rfc3339_opts(SecondsFormat::Millis, true));
    let scope = tokens.scope.clone().unwrap_or_else(|| config.scope.clone());

    state
        .db
        .create_session(&NewSession {
            id: &session_id,
            user_id: &identity.id,
            provider: PROVIDER,
            access_token: &tokens.access_token,
            refresh_token: tokens.refresh_token.as_deref(),
            scope: &scope,
            expires_at: expires_at.as_deref(),
            created_at: &created_at,
        })
        .map_err(ApiErr::from_db("session insert"))?;

    let claim = SessionToken {
        sid: session_id,
        uid: identity.id,
        u: identity.username,
    };
    let session_cookie = cookies::set(
        cookies::SESSION_COOKIE,
        &token::sign(&claim, &config.session_secret),
        cookies::SESSION_MAX_AGE,
    );

    // The pkce cookie is consumed only here, on success: a rejected callback
    // must not destroy a still-valid in-flight attempt.
    Ok((
        StatusCode::FOUND,
        AppendHeaders([
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, session_cookie),
            (header::SET_COOKIE, cookies::clear(cookies::PKCE_COOKIE)),
        ]),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// GET /me — who is logged in
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<MeUser>,
}

#[derive(Serialize)]
pub struct MeUser {
    pub id: String,
    pub username: String,
    pub title: Option<String>,
}

/// GET /me — identity of the caller, or `{"authenticated": false}`.
pub async fn me(user: MaybeUser) -> Json<MeResponse> {
    match user.0 {
        Some(session) => Json(MeResponse {
            authenticated: true,
            user: Some(MeUser {
                id: session.user_id,
                username: session.username,
                title: session.title,
            }),
        }),
        None => Json(MeResponse {
            authenticated: false,
            user: None,
        }),
    }
}

// ---------------------------------------------------------------------------
// GET /logout
// ---------------------------------------------------------------------------

/// GET /logout — delete the session row if present, always clear the cookie.
pub async fn logout(State(db): State<Db>, user: MaybeUser) -> Response {
    if let Some(session) = user.0 {
        if let Err(e) = db.delete_session(&session.session_id) {
            tracing::error!("session delete: {e}");
        }
    }

    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cookies::clear(cookies::SESSION_COOKIE))],
    )
        .into_response()
}

// ---------------------------------------------------------------------------
