//! Cookie parsing and Set-Cookie builders.
//!
//! Values are percent-encoded on the wire: signed tokens use standard
//! base64, whose `+`/`/`/`=` characters are not cookie-safe.

use axum::http::HeaderMap;
use std::collections::HashMap;

pub const PKCE_COOKIE: &str = "pkce";
pub const SESSION_COOKIE: &str = "session";

/// Lifetime of the pkce cookie: the login attempt window.
pub const PKCE_MAX_AGE: i64 = 600;
/// Lifetime of the session cookie: 30 days.
pub const SESSION_MAX_AGE: i64 = 30 * 24 * 3600;

/// Parse the request's `Cookie` header into a name → decoded-value map.
pub fn parse(headers: &HeaderMap) -> HashMap<String, String> {
    let raw = headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    raw.split(';')
        .filter_map(|part| {
            let (name, value) = match part.split_once('=') {
                Some((n, v)) => (n.trim(), v.trim()),
                None => (part.trim(), ""),
            };
            if name.is_empty() {
                return None;
            }
            let value = urlencoding::decode(value)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), value))
        })
        .collect()
}

/// `Set-Cookie` value attaching `value` under `name` with the standard
/// attributes: `Path=/; HttpOnly; SameSite=Lax` and the given max age.
pub fn set(name: &str, value: &str, max_age: i64) -> String {
    format!(
        "{name}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
        urlencoding::encode(value)
    )
}

/// `Set-Cookie` value that clears `name` immediately.
pub fn clear(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
}
