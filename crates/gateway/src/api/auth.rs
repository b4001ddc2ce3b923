//! API authentication middleware.
//!
//! The env var named by `config.server.api_token_env` (default
//! `CR_API_TOKEN`) is read once at startup and its SHA-256 digest cached in
//! `AppState`. When the var is set, every protected request must carry
//! `Authorization: Bearer <token>`; when it is unset or empty, the server
//! warns once and runs open (dev mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Bearer-token gate for protected routes. Attach via
/// `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    // `api_token_hash` is `None` in dev mode (no token configured).
    let expected_hash = match &state.api_token_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Hashing normalizes lengths so ct_eq always compares 32 bytes.
    let provided_hash = Sha256::digest(provided.as_bytes());

    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return (
            axum::http::StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "error": "invalid or missing API token", "code": "FORBIDDEN"
            })),
        )
            .into_response();
    }

    next.run(req).await
}

/// Digest an API token for `AppState`.
pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_32_bytes_regardless_of_input() {
        assert_eq!(hash_token("").len(), 32);
        assert_eq!(hash_token("secret").len(), 32);
        assert_eq!(hash_token(&"x".repeat(4096)).len(), 32);
    }

    #[test]
    fn different_tokens_hash_differently() {
        assert_ne!(hash_token("a"), hash_token("b"));
        assert_eq!(hash_token("a"), hash_token("a"));
    }
}
