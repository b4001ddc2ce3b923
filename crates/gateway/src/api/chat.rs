//! Chat API endpoints — the turn-processing interface.
//!
//! - `POST /v1/chat`          — run a turn, respond with its SSE stream
//! - `GET  /v1/chat/stream`   — reattach to a chat's in-flight stream
//! - `DELETE /v1/chat?id=...` — delete a chat and its messages
//!
//! The caller's identity arrives in the `x-user-id` header, set by the
//! session layer in front of this service; absent means a local caller.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use cr_domain::attachment::AttachmentInput;
use cr_domain::error::Error;
use cr_domain::message::Message;
use cr_domain::stream::BoxStream;

use crate::runtime::{run_turn, TurnParams};
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnBody {
    /// Chat ID; created on first use.
    pub id: String,
    /// Conversation history, newest last.
    pub messages: Vec<Message>,
    /// Model selector (agent routing).
    #[serde(default)]
    pub selected_chat_model: Option<String>,
    /// Attachments uploaded with this turn.
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
    /// Attachments picked from earlier uploads.
    #[serde(default)]
    pub selected_files: Vec<AttachmentInput>,
    /// Per-turn tool toggles, keyed by wire tool name.
    #[serde(default)]
    pub agent_tools: HashMap<String, bool>,
    /// Capability switches; same key space as `agentTools` on the wire.
    #[serde(default)]
    pub agent_features: HashMap<String, bool>,
    /// Extra context strings appended to the system prompt verbatim.
    #[serde(default)]
    pub system_queue: Vec<String>,
    /// Response language code.
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub chat_id: String,
    /// Chunk offset to resume from.
    #[serde(default)]
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

fn caller_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("local")
        .to_owned()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Map a domain error to its HTTP answer. The body is flat: `error` holds
/// the message, `code` the wire code, `failedFiles` the per-file detail
/// when there is one. Internal details never reach the wire; they go to
/// the log instead.
fn error_response(err: Error) -> Response {
    let code = err.code();
    let (status, body) = match &err {
        Error::FileAccess { failed } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "error": err.to_string(), "code": code, "failedFiles": failed
            }),
        ),
        Error::FileTooLarge { .. } | Error::InvalidRequest(_) => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": err.to_string(), "code": code }),
        ),
        Error::Forbidden(_) => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": err.to_string(), "code": code }),
        ),
        Error::NotFound(_) => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": err.to_string(), "code": code }),
        ),
        _ => {
            tracing::error!(error = %err, "turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "internal error", "code": "INTERNAL_ERROR" }),
            )
        }
    };
    (status, Json(body)).into_response()
}

fn sse_response(chunks: BoxStream<'static, bytes::Bytes>) -> Response {
    let body = Body::from_stream(futures_util::StreamExt::map(
        chunks,
        Ok::<_, std::convert::Infallible>,
    ));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_turn(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatTurnBody>,
) -> Response {
    // Fresh uploads and picks from earlier uploads resolve identically.
    let mut attachments = body.attachments;
    attachments.extend(body.selected_files);

    // Feature switches share the toggle key space; explicit tool toggles
    // win on collision. Keys naming no known tool are ignored downstream.
    let mut toggles = body.agent_features;
    toggles.extend(body.agent_tools);

    let params = TurnParams {
        chat_id: body.id,
        user_id: caller_id(&headers),
        selector: body.selected_chat_model.unwrap_or_default(),
        messages: body.messages,
        attachments,
        toggles,
        system_queue: body.system_queue,
        locale: body.locale,
    };

    let stream_id = match run_turn(&state, params).await {
        Ok(id) => id,
        Err(e) => return error_response(e),
    };

    match state.streams.subscribe(&stream_id, 0) {
        Some(chunks) => sse_response(chunks),
        // Completed buffers are retained, so this is only reachable when
        // the pump already failed and discarded the buffer.
        None => error_response(Error::Stream(format!("stream {stream_id} gone"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/chat/stream
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn resume_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Response {
    let user_id = caller_id(&headers);
    match state.store.get_chat(&query.chat_id).await {
        Ok(Some(chat)) if chat.user_id != user_id => {
            return error_response(Error::Forbidden(format!(
                "chat {} belongs to another user",
                query.chat_id
            )));
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(Error::NotFound(format!("chat {}", query.chat_id)));
        }
        Err(e) => return error_response(e),
    }

    let Some(stream_id) = state.streams.active_stream_for_chat(&query.chat_id) else {
        return error_response(Error::NotFound(format!(
            "no active stream for chat {}",
            query.chat_id
        )));
    };

    match state.streams.subscribe(&stream_id, query.offset) {
        Some(chunks) => sse_response(chunks),
        None => error_response(Error::NotFound(format!("stream {stream_id}"))),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE /v1/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn delete_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Response {
    // No id names no chat, which answers the same as an unknown one.
    let Some(chat_id) = query.id else {
        return error_response(Error::NotFound("chat".into()));
    };
    let user_id = caller_id(&headers);

    match state.store.get_chat(&chat_id).await {
        Ok(Some(chat)) if chat.user_id != user_id => {
            return error_response(Error::Forbidden(format!(
                "chat {chat_id} belongs to another user"
            )));
        }
        Ok(Some(_)) => {}
        Ok(None) => return error_response(Error::NotFound(format!("chat {chat_id}"))),
        Err(e) => return error_response(e),
    }

    // An in-flight turn for a deleted chat has nowhere to go.
    let aborted = state.streams.abort_for_chat(&chat_id);
    if aborted > 0 {
        tracing::info!(chat_id, aborted, "aborted in-flight streams before delete");
    }

    match state.store.delete_chat(&chat_id).await {
        Ok(()) => {
            tracing::info!(chat_id, "chat deleted");
            Json(serde_json::json!({ "deleted": chat_id })).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
