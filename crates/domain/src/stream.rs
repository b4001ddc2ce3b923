use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for provider streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted while a model provider streams a turn (provider-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelEvent {
    /// A text token chunk.
    #[serde(rename = "text_delta")]
    TextDelta { text: String },

    /// The model invoked a tool with complete arguments.
    #[serde(rename = "tool_call")]
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },

    /// A tool produced its output.
    #[serde(rename = "tool_result")]
    ToolResult {
        id: String,
        output: serde_json::Value,
    },

    /// The turn finished generating.
    #[serde(rename = "finish")]
    Finish {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// The provider failed mid-stream.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Token usage for a completed turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Lifecycle of a buffered response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Pending,
    Active,
    Complete,
    Errored,
}

impl StreamStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Errored)
    }
}
