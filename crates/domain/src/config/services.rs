use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible chat completions base URL.
    #[serde(default = "d_model_base_url")]
    pub base_url: String,
    /// Environment variable holding the provider API key.
    #[serde(default = "d_model_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_120")]
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: d_model_base_url(),
            api_key_env: d_model_key_env(),
            request_timeout_secs: 120,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// URL signing collaborator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Endpoint that exchanges an object-storage URL for a presigned
    /// fetchable URL.
    #[serde(default = "d_signing_endpoint")]
    pub endpoint: String,
    #[serde(default = "d_10")]
    pub timeout_secs: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            endpoint: d_signing_endpoint(),
            timeout_secs: 10,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Hard ceiling on a single attachment.
    #[serde(default = "d_100mb")]
    pub max_attachment_bytes: u64,
    /// Ceiling on a non-image file body fetched for inlining.
    #[serde(default = "d_10mb")]
    pub max_fetch_bytes: u64,
    #[serde(default = "d_20")]
    pub fetch_timeout_secs: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: d_100mb(),
            max_fetch_bytes: d_10mb(),
            fetch_timeout_secs: 20,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream buffers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Buffers older than this are evicted by the sweeper regardless of
    /// status, so an abandoned stream cannot pin memory forever.
    #[serde(default = "d_300")]
    pub max_buffer_age_secs: u64,
    #[serde(default = "d_60")]
    pub sweep_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_buffer_age_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for persisted chat state.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_model_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model_key_env() -> String {
    "CR_MODEL_API_KEY".into()
}
fn d_signing_endpoint() -> String {
    "http://127.0.0.1:9400/presigned-url".into()
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_10() -> u64 {
    10
}
fn d_20() -> u64 {
    20
}
fn d_60() -> u64 {
    60
}
fn d_120() -> u64 {
    120
}
fn d_300() -> u64 {
    300
}
fn d_100mb() -> u64 {
    100 * 1024 * 1024
}
fn d_10mb() -> u64 {
    10 * 1024 * 1024
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
