//! CORS policy from `server.cors.allowed_origins`.
//!
//! Entries are exact origins or `scheme://host:*`, which accepts that host on
//! any numeric port. A lone `"*"` allows everything without credentials.

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use sr_domain::config::CorsConfig;

use super::auth::PASSKEY_HEADER;

const METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

pub fn layer(cors: &CorsConfig) -> CorsLayer {
    let headers = [CONTENT_TYPE, HeaderName::from_static(PASSKEY_HEADER)];

    if matches!(cors.allowed_origins.as_slice(), [only] if only == "*") {
        tracing::warn!("CORS allows every origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(METHODS)
            .allow_headers(headers);
    }

    for origin in &cors.allowed_origins {
        if !origin.ends_with(":*") && origin.parse::<HeaderValue>().is_err() {
            tracing::warn!(origin = %origin, "ignoring malformed CORS origin");
        }
    }
    let patterns = cors.allowed_origins.clone();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            origin
                .to_str()
                .is_ok_and(|origin| patterns.iter().any(|p| origin_matches(p, origin)))
        }))
        .allow_methods(METHODS)
        .allow_headers(headers)
        .allow_credentials(true)
}

fn origin_matches(pattern: &str, origin: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with(':') => origin
            .strip_prefix(prefix)
            .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())),
        _ => pattern == origin,
    }
}
