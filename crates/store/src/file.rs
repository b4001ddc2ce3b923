//! JSON-file chat store.
//!
//! Layout under `state_path/chats/`:
//! - `chats.json` — the chat index, written through on every mutation
//! - `messages/<chat_id>.jsonl` — append-only message log per chat

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use cr_domain::error::{Error, Result};

use crate::{ChatRecord, ChatStore, StoredMessage};

pub struct FileChatStore {
    index_path: PathBuf,
    messages_dir: PathBuf,
    chats: RwLock<HashMap<String, ChatRecord>>,
}

impl FileChatStore {
    /// Load or create the store at `state_path/chats/`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("chats");
        let messages_dir = dir.join("messages");
        std::fs::create_dir_all(&messages_dir).map_err(Error::Io)?;

        let index_path = dir.join("chats.json");
        let chats: HashMap<String, ChatRecord> = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            chats = chats.len(),
            path = %index_path.display(),
            "chat store loaded"
        );

        Ok(Self {
            index_path,
            messages_dir,
            chats: RwLock::new(chats),
        })
    }

    fn message_log_path(&self, chat_id: &str) -> PathBuf {
        // Chat IDs are UUIDs minted by clients; refuse anything that could
        // escape the messages directory.
        let safe: String = chat_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        self.messages_dir.join(format!("{safe}.jsonl"))
    }

    fn flush_index(&self) -> Result<()> {
        let chats = self.chats.read();
        let json = serde_json::to_string_pretty(&*chats)?;
        std::fs::write(&self.index_path, json).map_err(Error::Io)
    }
}

#[async_trait::async_trait]
impl ChatStore for FileChatStore {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<ChatRecord>> {
        Ok(self.chats.read().get(chat_id).cloned())
    }

    async fn create_chat(&self, record: ChatRecord) -> Result<()> {
        {
            let mut chats = self.chats.write();
            chats.insert(record.id.clone(), record);
        }
        self.flush_index()
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let removed = self.chats.write().remove(chat_id);
        if removed.is_none() {
            return Err(Error::NotFound(format!("chat {chat_id}")));
        }
        self.flush_index()?;

        let log = self.message_log_path(chat_id);
        if log.exists() {
            std::fs::remove_file(&log).map_err(Error::Io)?;
        }
        Ok(())
    }

    async fn messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>> {
        let log = self.message_log_path(chat_id);
        if !log.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&log).map_err(Error::Io)?;
        let mut out = Vec::new();
        for line in raw.lines() {
            match serde_json::from_str::<StoredMessage>(line) {
                Ok(m) => out.push(m),
                Err(e) => {
                    tracing::warn!(chat_id, error = %e, "skipping corrupt message log line")
                }
            }
        }
        Ok(out)
    }

    async fn append_message(&self, chat_id: &str, message: StoredMessage) -> Result<()> {
        {
            let mut chats = self.chats.write();
            match chats.get_mut(chat_id) {
                Some(record) => record.updated_at = chrono::Utc::now(),
                None => return Err(Error::NotFound(format!("chat {chat_id}"))),
            }
        }

        let json = serde_json::to_string(&message)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.message_log_path(chat_id))
            .map_err(Error::Io)?;
        writeln!(file, "{json}").map_err(Error::Io)?;

        self.flush_index()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
