//! Custom CORS handling for `/api/browser/*` (spec §4.6): echoes `Origin`
//! when allowlisted, answers preflight `OPTIONS` with a fixed header set,
//! and never emits CORS headers at all when no allowlist is configured.

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::extract::{Request, State};

use crate::AppState;

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "X-Monlight-Key, Content-Type";

fn allowed_origin<'a>(allowlist: &'a [String], origin: &str) -> Option<&'a str> {
    allowlist.iter().find(|o| o.as_str() == origin).map(|s| s.as_str())
}

/// Middleware layered only on `/api/browser/*`. Preflight requests are
/// answered directly; everything else passes through with the CORS
/// header added (or not) before the handler runs.
pub async fn layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let allowlist = &state.config.cors_origins;
    let origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = origin.as_deref() {
            if let Some(matched) = allowed_origin(allowlist, origin) {
                apply_headers(response.headers_mut(), matched);
            }
        }
        return response;
    }

    let mut response = next.run(req).await;
    if let Some(origin) = origin.as_deref() {
        if let Some(matched) = allowed_origin(allowlist, origin) {
            if let Ok(value) = HeaderValue::from_str(matched) {
                response.headers_mut().insert("access-control-allow-origin", value);
            }
        }
    }
    response
}

fn apply_headers(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert("access-control-allow-origin", value);
    }
    headers.insert("access-control-allow-methods", HeaderValue::from_static(ALLOW_METHODS));
    headers.insert("access-control-allow-headers", HeaderValue::from_static(ALLOW_HEADERS));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlisted_origin_matches_exactly() {
        let allowlist = vec!["https://a".to_string(), "https://b".to_string()];
        assert_eq!(allowed_origin(&allowlist, "https://a"), Some("https://a"));
        assert_eq!(allowed_origin(&allowlist, "https://c"), None);
    }
}
