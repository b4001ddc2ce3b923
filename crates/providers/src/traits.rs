use cr_domain::error::Result;
use cr_domain::message::Message;
use cr_domain::stream::{BoxStream, ModelEvent};
use cr_domain::tool::ToolDefinition;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic streaming chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Normalized conversation history, newest last.
    pub messages: Vec<Message>,
    /// Assembled system prompt. Sent ahead of `messages`.
    pub system: Option<String>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Model identifier. `None` lets the provider choose its default.
    pub model: Option<String>,
    /// Sampling temperature. `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response.
    pub max_tokens: Option<u32>,
    /// Ceiling on tool-use round trips within the turn.
    pub max_steps: Option<u32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every model adapter implements.
///
/// Tool execution happens provider-side: the event stream carries tool
/// calls and their results interleaved with text deltas, ending with a
/// `Finish` event (or `Error`).
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    /// Dispatch a turn and return the event stream.
    async fn stream_chat(
        &self,
        req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
