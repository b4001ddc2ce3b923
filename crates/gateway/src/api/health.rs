//! Liveness probe.

use axum::extract::State;
use axum::response::Json;

use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.provider.provider_id(),
        "activeStreams": state.streams.len(),
    }))
}
