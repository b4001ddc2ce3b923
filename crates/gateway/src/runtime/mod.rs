//! Turn orchestration.
//!
//! [`run_turn`] is the whole pipeline for one POST: resolve attachments,
//! find or create the chat, normalize history, resolve the agent, persist
//! the user message, and hand the provider stream to the registry. The
//! handler then subscribes to the returned stream ID.

pub mod agent;
pub mod attachments;
pub mod normalize;
pub mod streams;
pub mod turn;

use std::collections::HashMap;

use cr_domain::attachment::AttachmentInput;
use cr_domain::error::{Error, Result};
use cr_domain::message::{Message, Part, Role};
use cr_providers::ChatRequest;
use cr_store::{ChatRecord, StoredMessage};

use crate::state::AppState;

const TITLE_MAX_CHARS: usize = 80;

/// Everything the HTTP layer extracts from one chat POST.
pub struct TurnParams {
    pub chat_id: String,
    pub user_id: String,
    pub selector: String,
    pub messages: Vec<Message>,
    pub attachments: Vec<AttachmentInput>,
    pub toggles: HashMap<String, bool>,
    pub system_queue: Vec<String>,
    pub locale: Option<String>,
}

/// Run one turn end to end. Returns the stream ID to subscribe to.
pub async fn run_turn(state: &AppState, params: TurnParams) -> Result<String> {
    if params.messages.is_empty() {
        return Err(Error::InvalidRequest("messages must not be empty".into()));
    }

    let resolution = attachments::resolve_attachments(
        state.signer.as_ref(),
        &state.config.files,
        &params.attachments,
    )
    .await?;

    ensure_chat(state, &params).await?;

    // Attachments ride on the last user message as file parts.
    let mut messages = params.messages;
    if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
        for att in &resolution.attachments {
            if let Some(url) = &att.resolved_url {
                last_user.parts.push(Part::File {
                    url: url.clone(),
                    media_type: att.media_type.clone(),
                    filename: Some(att.name.clone()),
                    size_bytes: att.size_bytes,
                });
            }
        }
    }

    let messages = normalize::normalize_turn(
        &state.fetcher,
        &state.config.files,
        messages,
        &resolution.url_map,
    )
    .await;
    if messages.is_empty() {
        return Err(Error::InvalidRequest(
            "no renderable messages after normalization".into(),
        ));
    }

    if let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) {
        state
            .store
            .append_message(&params.chat_id, StoredMessage::new(last_user.clone()))
            .await?;
    }

    let resolved = agent::resolve_agent(
        &params.selector,
        &params.toggles,
        &params.system_queue,
        params.locale.as_deref(),
    );

    let fallback = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .cloned();

    let request = ChatRequest {
        messages,
        system: Some(resolved.system_prompt),
        tools: resolved.tools.iter().map(|t| t.definition()).collect(),
        model: Some(resolved.agent.model_id.to_owned()),
        temperature: Some(resolved.agent.temperature),
        max_tokens: None,
        max_steps: Some(resolved.agent.max_steps),
    };

    let stream_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        chat_id = %params.chat_id,
        stream_id = %stream_id,
        agent = %resolved.agent.agent_type,
        tools = resolved.tools.len(),
        "starting turn"
    );

    turn::start_turn(
        state,
        turn::TurnContext {
            chat_id: params.chat_id,
            stream_id: stream_id.clone(),
            agent_type: resolved.agent.agent_type,
            model_id: resolved.agent.model_id.to_owned(),
            request,
            fallback_assistant: fallback,
        },
    )
    .await?;

    Ok(stream_id)
}

/// Look up the chat, enforcing ownership; create it on first use with a
/// title drawn from the first user message.
async fn ensure_chat(state: &AppState, params: &TurnParams) -> Result<()> {
    match state.store.get_chat(&params.chat_id).await? {
        Some(chat) => {
            if chat.user_id != params.user_id {
                return Err(Error::Forbidden(format!(
                    "chat {} belongs to another user",
                    params.chat_id
                )));
            }
            Ok(())
        }
        None => {
            let title = params
                .messages
                .iter()
                .find(|m| m.role == Role::User)
                .and_then(Message::text)
                .map(derive_title)
                .unwrap_or_else(|| "New chat".to_owned());
            state
                .store
                .create_chat(ChatRecord::new(
                    params.chat_id.clone(),
                    params.user_id.clone(),
                    title,
                ))
                .await
        }
    }
}

/// First line of the text, truncated on a char boundary.
fn derive_title(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "New chat".to_owned();
    }
    match line.char_indices().nth(TITLE_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_first_line() {
        assert_eq!(derive_title("Hello there\nsecond line"), "Hello there");
        assert_eq!(derive_title("  padded  "), "padded");
        assert_eq!(derive_title("\n\n"), "New chat");
    }

    #[test]
    fn title_truncates_on_char_boundary() {
        let long = "ą".repeat(100);
        let title = derive_title(&long);
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.ends_with('…'));
    }
}
