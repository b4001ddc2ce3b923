//! OpenAI-compatible streaming adapter.
//!
//! Works against any endpoint that follows the chat completions wire
//! contract (OpenAI, Azure-style gateways, vLLM, Ollama). Tool calls are
//! assembled from argument deltas before being surfaced as single events.

use std::collections::BTreeMap;

use serde_json::Value;

use cr_domain::config::ModelConfig;
use cr_domain::error::{Error, Result};
use cr_domain::message::{Message, Part, Role};
use cr_domain::stream::{BoxStream, ModelEvent, Usage};
use cr_domain::tool::ToolDefinition;

use crate::sse::{event_stream, from_reqwest};
use crate::traits::{ChatRequest, ModelProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Build the adapter from config. The API key is read from the
    /// configured env var once; a missing key is allowed (self-hosted
    /// endpoints often run without auth) but logged.
    pub fn new(cfg: &ModelConfig, default_model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %cfg.api_key_env,
                "model API key env var not set — requests go out unauthenticated"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: default_model.into(),
            client,
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let mut messages: Vec<Value> = Vec::new();
        if let Some(system) = &req.system {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        for msg in &req.messages {
            messages.extend(msg_to_wire(msg));
        }

        let mut body = serde_json::json!({
            "model": req.model.clone().unwrap_or_else(|| self.default_model.clone()),
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_wire).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(t) = req.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(m);
        }
        body
    }
}

#[async_trait::async_trait]
impl ModelProvider for OpenAiProvider {
    async fn stream_chat(
        &self,
        req: ChatRequest,
    ) -> Result<BoxStream<'static, Result<ModelEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&req);

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(from_reqwest)?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: "openai".into(),
                message: format!("{status}: {detail}"),
            });
        }

        let mut assembly = ChunkAssembly::default();
        Ok(event_stream(response, move |payload| {
            assembly.parse(payload)
        }))
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delta assembly
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
    args: String,
}

/// Mutable parser state carried across SSE payloads.
#[derive(Default)]
struct ChunkAssembly {
    calls: BTreeMap<u64, PendingCall>,
    finish_reason: Option<String>,
}

impl ChunkAssembly {
    fn parse(&mut self, payload: &str) -> Vec<Result<ModelEvent>> {
        if payload == "[DONE]" {
            return Vec::new();
        }
        let chunk: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed stream chunk");
                return Vec::new();
            }
        };

        let mut events = Vec::new();

        if let Some(delta) = chunk.pointer("/choices/0/delta") {
            if let Some(text) = delta.get("content").and_then(Value::as_str) {
                if !text.is_empty() {
                    events.push(Ok(ModelEvent::TextDelta { text: text.into() }));
                }
            }
            if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
                for tc in tool_calls {
                    let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0);
                    let entry = self.calls.entry(index).or_default();
                    if let Some(id) = tc.get("id").and_then(Value::as_str) {
                        entry.id = id.into();
                    }
                    if let Some(name) = tc.pointer("/function/name").and_then(Value::as_str) {
                        entry.name.push_str(name);
                    }
                    if let Some(args) =
                        tc.pointer("/function/arguments").and_then(Value::as_str)
                    {
                        entry.args.push_str(args);
                    }
                }
            }
        }

        if let Some(reason) = chunk
            .pointer("/choices/0/finish_reason")
            .and_then(Value::as_str)
        {
            self.finish_reason = Some(reason.into());
            events.extend(self.flush_calls());
        }

        // The usage chunk arrives last, after choices have drained.
        if let Some(usage) = chunk.get("usage").filter(|u| !u.is_null()) {
            let usage = Usage {
                input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
                output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
            };
            events.push(Ok(ModelEvent::Finish {
                usage: Some(usage),
                finish_reason: self.finish_reason.take(),
            }));
        }

        events
    }

    fn flush_calls(&mut self) -> Vec<Result<ModelEvent>> {
        let calls = std::mem::take(&mut self.calls);
        calls
            .into_values()
            .map(|call| {
                let args = serde_json::from_str(&call.args)
                    .unwrap_or(Value::Object(Default::default()));
                Ok(ModelEvent::ToolCall {
                    id: call.id,
                    name: call.name,
                    args,
                })
            })
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// One domain message can expand to several wire messages: tool results
/// ride in their own `tool`-role entries after the assistant entry that
/// carries the matching calls.
fn msg_to_wire(msg: &Message) -> Vec<Value> {
    let mut out = Vec::new();
    let mut text = String::new();
    let mut content_parts: Vec<Value> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();
    let mut tool_results: Vec<Value> = Vec::new();

    for part in &msg.parts {
        match part {
            Part::Text { text: t } => {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(t);
            }
            Part::File { url, media_type, .. } => {
                // Only image files reach the provider; non-images were
                // inlined or dropped by the normalizer.
                if media_type.as_deref().is_some_and(|m| m.starts_with("image/")) {
                    content_parts.push(serde_json::json!({
                        "type": "image_url",
                        "image_url": { "url": url },
                    }));
                }
            }
            Part::ToolCall { id, name, args } => {
                tool_calls.push(serde_json::json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": args.to_string() },
                }));
            }
            Part::ToolResult { id, output } => {
                tool_results.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": output.to_string(),
                }));
            }
        }
    }

    let mut entry = serde_json::json!({ "role": role_str(msg.role) });
    if !content_parts.is_empty() {
        if !text.is_empty() {
            content_parts.insert(0, serde_json::json!({ "type": "text", "text": text }));
        }
        entry["content"] = Value::Array(content_parts);
    } else if !text.is_empty() {
        entry["content"] = Value::String(text);
    } else {
        entry["content"] = Value::Null;
    }
    if !tool_calls.is_empty() {
        entry["tool_calls"] = Value::Array(tool_calls);
    }
    out.push(entry);
    out.extend(tool_results);
    out
}

fn tool_to_wire(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_delta_parsed() {
        let mut asm = ChunkAssembly::default();
        let events = asm.parse(r#"{"choices":[{"delta":{"content":"hel"}}]}"#);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Ok(ModelEvent::TextDelta { ref text }) if text == "hel"
        ));
    }

    #[test]
    fn tool_call_assembled_across_chunks() {
        let mut asm = ChunkAssembly::default();
        asm.parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"get_weather","arguments":"{\"lat"}}]}}]}"#,
        );
        asm.parse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"itude\":1.5}"}}]}}]}"#,
        );
        let events =
            asm.parse(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(ModelEvent::ToolCall { id, name, args }) => {
                assert_eq!(id, "c1");
                assert_eq!(name, "get_weather");
                assert_eq!(args["latitude"], 1.5);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn usage_chunk_yields_finish() {
        let mut asm = ChunkAssembly::default();
        asm.parse(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        let events = asm.parse(
            r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#,
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(ModelEvent::Finish { usage, finish_reason }) => {
                let usage = usage.expect("usage present");
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.total_tokens, 15);
                assert_eq!(finish_reason.as_deref(), Some("stop"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_chunk_skipped() {
        let mut asm = ChunkAssembly::default();
        assert!(asm.parse("not json").is_empty());
    }

    #[test]
    fn assistant_message_with_tool_parts_expands() {
        let msg = Message {
            id: "m".into(),
            role: Role::Assistant,
            parts: vec![
                Part::text("checking"),
                Part::ToolCall {
                    id: "c1".into(),
                    name: "get_weather".into(),
                    args: serde_json::json!({"latitude": 1.0, "longitude": 2.0}),
                },
                Part::ToolResult {
                    id: "c1".into(),
                    output: serde_json::json!({"temp_c": 21}),
                },
            ],
        };
        let wire = msg_to_wire(&msg);
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0]["role"], "assistant");
        assert_eq!(wire[0]["tool_calls"][0]["id"], "c1");
        assert_eq!(wire[1]["role"], "tool");
        assert_eq!(wire[1]["tool_call_id"], "c1");
    }

    #[test]
    fn image_file_becomes_image_url_part() {
        let msg = Message {
            id: "m".into(),
            role: Role::User,
            parts: vec![
                Part::text("what is this"),
                Part::File {
                    url: "https://cdn/x.png".into(),
                    media_type: Some("image/png".into()),
                    filename: Some("x.png".into()),
                    size_bytes: None,
                },
            ],
        };
        let wire = msg_to_wire(&msg);
        assert_eq!(wire.len(), 1);
        let content = wire[0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
    }
}
