//! Read-only relay for lichess.org API calls the browser cannot make
//! directly from every deployment origin. The target host is pinned.

use axum::{
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use url::Url;

use crate::AppState;
use crate::error::ApiErr;

/// GET /lichess-proxy?u=<url> — forward a GET to lichess.org.
pub async fn lichess_proxy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiErr> {
    let Some(target) = params.get("u") else {
        return Ok((StatusCode::BAD_REQUEST, "missing u").into_response());
    };

    let parsed = Url::parse(target).map_err(|_| ApiErr::bad_request("invalid target url"))?;
    if parsed.host_str() != Some("lichess.org") {
        return Ok((StatusCode::FORBIDDEN, "forbidden").into_response());
    }

    let (status, content_type, body) = state.lichess.proxy_get(&parsed).await?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);

    Ok(relay_response(status, content_type, body))
}

/// Build the relayed response, echoing the upstream content type when the
/// upstream sent one.
fn relay_response(status: StatusCode, content_type: Option<String>, body: Vec<u8>) -> Response {
    let mut response = (status, body).into_response();
    if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
}
