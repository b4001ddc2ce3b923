use serde::{Deserialize, Serialize};

/// A message in the conversation (provider-agnostic).
///
/// Inbound history arrives in this shape from clients; the normalizer in the
/// gateway is responsible for making the part lists well-formed before a
/// turn is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One part of a message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Part {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "file", rename_all = "camelCase")]
    File {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size_bytes: Option<u64>,
    },

    #[serde(rename = "tool_call")]
    ToolCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        id: String,
        output: serde_json::Value,
    },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            parts: vec![Part::text(text)],
        }
    }

    /// First text part, if any.
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// A message is renderable when at least one part carries content a
    /// provider can act on. Whitespace-only text does not count.
    pub fn is_renderable(&self) -> bool {
        self.parts.iter().any(|p| match p {
            Part::Text { text } => !text.trim().is_empty(),
            Part::File { .. } | Part::ToolCall { .. } | Part::ToolResult { .. } => true,
        })
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Part::ToolCall { .. })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_round_trip_tagged() {
        let msg = Message {
            id: "m1".into(),
            role: Role::User,
            parts: vec![
                Part::text("hi"),
                Part::File {
                    url: "https://x/cat.png".into(),
                    media_type: Some("image/png".into()),
                    filename: Some("cat.png".into()),
                    size_bytes: None,
                },
            ],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["parts"][0]["type"], "text");
        assert_eq!(json["parts"][1]["type"], "file");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.parts.len(), 2);
    }

    #[test]
    fn whitespace_text_is_not_renderable() {
        let msg = Message {
            id: "m1".into(),
            role: Role::User,
            parts: vec![Part::text("   \n")],
        };
        assert!(!msg.is_renderable());
    }

    #[test]
    fn empty_parts_not_renderable() {
        let msg = Message {
            id: "m1".into(),
            role: Role::Assistant,
            parts: vec![],
        };
        assert!(!msg.is_renderable());
    }

    #[test]
    fn missing_id_gets_generated() {
        let msg: Message = serde_json::from_str(
            r#"{"role":"user","parts":[{"type":"text","text":"hi"}]}"#,
        )
        .unwrap();
        assert!(!msg.id.is_empty());
    }
}
