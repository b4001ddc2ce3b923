//! Chat persistence boundary.
//!
//! The gateway talks to storage through [`ChatStore`]; the bundled
//! implementation is a JSON-file store (`chats.json` index plus one JSONL
//! message log per chat). Anything that can satisfy the trait — a real
//! database, a remote service — can be swapped in behind `Arc<dyn ChatStore>`.

pub mod file;

pub use file::FileChatStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cr_domain::agent::AgentType;
use cr_domain::error::Result;
use cr_domain::message::Message;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    /// Owner, as reported by the session collaborator.
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatRecord {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Turn accounting attached to a persisted assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub model_id: String,
    pub agent_type: AgentType,
}

/// A message as persisted, with optional turn metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(message: Message, metadata: MessageMetadata) -> Self {
        Self {
            message,
            metadata: Some(metadata),
            created_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>>;

    async fn create_chat(&self, record: ChatRecord) -> Result<()>;

    /// Remove the chat and its message log. Missing chats are an error so
    /// the HTTP layer can answer 404.
    async fn delete_chat(&self, chat_id: &str) -> Result<()>;

    async fn messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>>;

    async fn append_message(&self, chat_id: &str, message: StoredMessage) -> Result<()>;
}
