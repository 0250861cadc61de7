//! Passkey middleware for the control API.
//!
//! The passkey comes from the env var named by `config.server.passkey_env`
//! (default `SR_PASSKEY`), read **once at startup** and cached in `AppState`
//! as a SHA-256 digest. Requests must carry it in `x-passkey`. With no passkey
//! configured the API is open (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

pub const PASSKEY_HEADER: &str = "x-passkey";

/// Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_passkey(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.passkey_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get(PASSKEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    // Compare fixed-length digests so the passkey length does not leak.
    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return (
            StatusCode::FORBIDDEN,
            axum::Json(serde_json::json!({
                "success": false,
                "message": "Forbidden: Invalid passkey",
            })),
        )
            .into_response();
    }

    next.run(req).await
}

pub fn hash_passkey(passkey: &str) -> Vec<u8> {
    Sha256::digest(passkey.as_bytes()).to_vec()
}
