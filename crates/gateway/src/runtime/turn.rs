//! Turn execution and finalization.
//!
//! [`start_turn`] dispatches the provider request and wraps its event
//! stream as SSE frames feeding the stream registry. While frames flow
//! out, a [`TurnAccumulator`] absorbs the same events into the assistant
//! message that gets persisted when the stream ends cleanly.
//!
//! Finalization order matters: the assistant message is persisted before
//! the frame stream ends, so the buffer is only marked complete (and made
//! evictable) once storage has the message. Persistence failures are
//! logged and swallowed; the viewer already has the full response.

use std::sync::Arc;

use bytes::Bytes;

use cr_domain::agent::AgentType;
use cr_domain::error::{Error, Result};
use cr_domain::message::{Message, Part, Role};
use cr_domain::stream::{BoxStream, ModelEvent, Usage};
use cr_providers::ChatRequest;
use cr_store::{ChatStore, MessageMetadata, StoredMessage};

use crate::state::AppState;

/// Everything a turn needs once request assembly is done.
pub struct TurnContext {
    pub chat_id: String,
    pub stream_id: String,
    pub agent_type: AgentType,
    pub model_id: String,
    pub request: ChatRequest,
    /// Persisted if the provider produces no renderable output.
    pub fallback_assistant: Option<Message>,
}

/// One SSE frame: `data: {json}\n\n`.
fn encode_frame(event: &ModelEvent) -> Result<Bytes> {
    let json = serde_json::to_string(event)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Accumulator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Builds the assistant message out of the event stream as it passes by.
#[derive(Default)]
pub struct TurnAccumulator {
    parts: Vec<Part>,
    usage: Option<Usage>,
}

impl TurnAccumulator {
    pub fn absorb(&mut self, event: &ModelEvent) {
        match event {
            ModelEvent::TextDelta { text } => {
                // Consecutive deltas coalesce into one text part.
                if let Some(Part::Text { text: last }) = self.parts.last_mut() {
                    last.push_str(text);
                } else {
                    self.parts.push(Part::text(text.clone()));
                }
            }
            ModelEvent::ToolCall { id, name, args } => self.parts.push(Part::ToolCall {
                id: id.clone(),
                name: name.clone(),
                args: args.clone(),
            }),
            ModelEvent::ToolResult { id, output } => self.parts.push(Part::ToolResult {
                id: id.clone(),
                output: output.clone(),
            }),
            ModelEvent::Finish { usage, .. } => {
                if usage.is_some() {
                    self.usage = *usage;
                }
            }
            ModelEvent::Error { .. } => {}
        }
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// The assembled assistant message, or `None` when nothing renderable
    /// accumulated.
    pub fn into_message(self) -> Option<Message> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            parts: self.parts,
        };
        message.is_renderable().then_some(message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Dispatch the provider request and hand the frame stream to the registry.
///
/// The returned error covers dispatch only; once the pump is running, any
/// mid-stream provider failure discards the buffer instead.
pub async fn start_turn(state: &AppState, ctx: TurnContext) -> Result<()> {
    let events = state.provider.stream_chat(ctx.request.clone()).await?;
    let frames = frame_stream(
        events,
        Arc::clone(&state.store),
        ctx.chat_id.clone(),
        ctx.agent_type,
        ctx.model_id.clone(),
        ctx.fallback_assistant.clone(),
    );
    state.streams.start(&ctx.stream_id, &ctx.chat_id, frames)
}

/// Wrap provider events as SSE frames, persisting the assistant message
/// just before the stream ends cleanly. A provider `Error` event becomes a
/// stream error, which makes the registry discard the buffer unpersisted.
fn frame_stream(
    mut events: BoxStream<'static, Result<ModelEvent>>,
    store: Arc<dyn ChatStore>,
    chat_id: String,
    agent_type: AgentType,
    model_id: String,
    fallback: Option<Message>,
) -> BoxStream<'static, Result<Bytes>> {
    use futures_util::StreamExt;

    Box::pin(async_stream::stream! {
        let mut acc = TurnAccumulator::default();
        while let Some(item) = events.next().await {
            match item {
                Ok(ModelEvent::Error { message }) => {
                    yield Err(Error::Provider {
                        provider: "stream".into(),
                        message,
                    });
                    return;
                }
                Ok(event) => {
                    acc.absorb(&event);
                    yield encode_frame(&event);
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        finalize(&*store, &chat_id, agent_type, &model_id, acc, fallback).await;
    })
}

/// Persist the turn's assistant message. Never fails the stream.
async fn finalize(
    store: &dyn ChatStore,
    chat_id: &str,
    agent_type: AgentType,
    model_id: &str,
    acc: TurnAccumulator,
    fallback: Option<Message>,
) {
    let usage = acc.usage().unwrap_or_default();
    let message = match acc.into_message().or(fallback) {
        Some(m) => m,
        None => {
            tracing::warn!(chat_id, "turn produced no persistable assistant message");
            return;
        }
    };

    let stored = StoredMessage::with_metadata(
        message,
        MessageMetadata {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            model_id: model_id.to_owned(),
            agent_type,
        },
    );
    if let Err(e) = store.append_message(chat_id, stored).await {
        tracing::error!(chat_id, error = %e, "failed to persist assistant message");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use cr_store::{ChatRecord, FileChatStore};
    use futures_util::StreamExt;

    fn delta(text: &str) -> ModelEvent {
        ModelEvent::TextDelta { text: text.into() }
    }

    #[test]
    fn accumulator_coalesces_text_and_orders_parts() {
        let mut acc = TurnAccumulator::default();
        acc.absorb(&delta("Hel"));
        acc.absorb(&delta("lo. "));
        acc.absorb(&ModelEvent::ToolCall {
            id: "c1".into(),
            name: "get_weather".into(),
            args: serde_json::json!({"latitude": 54.7}),
        });
        acc.absorb(&ModelEvent::ToolResult {
            id: "c1".into(),
            output: serde_json::json!({"temp_c": 17}),
        });
        acc.absorb(&delta("It is 17C."));
        acc.absorb(&ModelEvent::Finish {
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            }),
            finish_reason: Some("stop".into()),
        });

        assert_eq!(acc.usage().unwrap().total_tokens, 15);
        let msg = acc.into_message().unwrap();
        assert_eq!(msg.parts.len(), 4);
        assert!(matches!(&msg.parts[0], Part::Text { text } if text == "Hello. "));
        assert!(matches!(&msg.parts[1], Part::ToolCall { .. }));
        assert!(matches!(&msg.parts[2], Part::ToolResult { .. }));
        assert!(matches!(&msg.parts[3], Part::Text { text } if text == "It is 17C."));
    }

    #[test]
    fn empty_accumulation_yields_no_message() {
        let acc = TurnAccumulator::default();
        assert!(acc.into_message().is_none());

        let mut acc = TurnAccumulator::default();
        acc.absorb(&delta("   "));
        assert!(acc.into_message().is_none());
    }

    #[test]
    fn frames_are_sse_shaped() {
        let frame = encode_frame(&delta("hi")).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains(r#""type":"text_delta""#));
    }

    #[tokio::test]
    async fn clean_stream_persists_assistant_message() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChatStore> =
            Arc::new(FileChatStore::new(dir.path()).unwrap());
        store
            .create_chat(ChatRecord::new("c1", "u1", "test"))
            .await
            .unwrap();

        let events: BoxStream<'static, Result<ModelEvent>> =
            Box::pin(futures_util::stream::iter(vec![
                Ok(delta("hello")),
                Ok(ModelEvent::Finish {
                    usage: Some(Usage {
                        input_tokens: 3,
                        output_tokens: 2,
                        total_tokens: 5,
                    }),
                    finish_reason: Some("stop".into()),
                }),
            ]));

        let mut frames = frame_stream(
            events,
            Arc::clone(&store),
            "c1".into(),
            AgentType::General,
            "gpt-4o".into(),
            None,
        );
        while let Some(item) = frames.next().await {
            item.unwrap();
        }

        let stored = store.messages("c1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message.text(), Some("hello"));
        let meta = stored[0].metadata.as_ref().unwrap();
        assert_eq!(meta.total_tokens, 5);
        assert_eq!(meta.model_id, "gpt-4o");
    }

    #[tokio::test]
    async fn error_event_fails_stream_and_skips_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChatStore> =
            Arc::new(FileChatStore::new(dir.path()).unwrap());
        store
            .create_chat(ChatRecord::new("c1", "u1", "test"))
            .await
            .unwrap();

        let events: BoxStream<'static, Result<ModelEvent>> =
            Box::pin(futures_util::stream::iter(vec![
                Ok(delta("partial")),
                Ok(ModelEvent::Error {
                    message: "rate limited".into(),
                }),
            ]));

        let mut frames = frame_stream(
            events,
            Arc::clone(&store),
            "c1".into(),
            AgentType::General,
            "gpt-4o".into(),
            None,
        );
        let first = frames.next().await.unwrap();
        assert!(first.is_ok());
        let second = frames.next().await.unwrap();
        assert!(second.is_err());
        assert!(frames.next().await.is_none());

        assert!(store.messages("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fallback_used_when_stream_produced_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ChatStore> =
            Arc::new(FileChatStore::new(dir.path()).unwrap());
        store
            .create_chat(ChatRecord::new("c1", "u1", "test"))
            .await
            .unwrap();

        let events: BoxStream<'static, Result<ModelEvent>> =
            Box::pin(futures_util::stream::iter(vec![Ok(ModelEvent::Finish {
                usage: None,
                finish_reason: Some("stop".into()),
            })]));

        let fallback = Message::assistant("previous answer");
        let mut frames = frame_stream(
            events,
            Arc::clone(&store),
            "c1".into(),
            AgentType::General,
            "gpt-4o".into(),
            Some(fallback),
        );
        while let Some(item) = frames.next().await {
            item.unwrap();
        }

        let stored = store.messages("c1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message.text(), Some("previous answer"));
        // No usage arrived, so accounting is zeroed, not missing.
        assert_eq!(stored[0].metadata.as_ref().unwrap().total_tokens, 0);
    }
}
