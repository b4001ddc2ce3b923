pub mod auth;
pub mod chat;
pub mod health;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes split into **public** (health probes) and **protected** (gated
/// behind the `CR_API_TOKEN` bearer-token middleware).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/healthz", get(health::healthz));

    let protected = Router::new()
        .route("/v1/chat", post(chat::chat_turn))
        .route("/v1/chat", delete(chat::delete_chat))
        .route("/v1/chat/stream", get(chat::resume_stream))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}
