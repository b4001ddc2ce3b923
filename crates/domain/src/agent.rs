//! Agent definitions.
//!
//! Every turn runs under exactly one agent. The registry is static and
//! selector resolution is total: unknown selectors fall back to the general
//! agent rather than failing the turn.

use serde::{Deserialize, Serialize};

use crate::tool::ToolName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    General,
    Research,
    Vision,
    Document,
}

impl AgentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentType::General => "general",
            AgentType::Research => "research",
            AgentType::Vision => "vision",
            AgentType::Document => "document",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentDefinition {
    pub agent_type: AgentType,
    /// Tools this agent may ever use. Inclusion still depends on the
    /// per-turn toggles evaluated by the agent resolver.
    pub allowed_tools: &'static [ToolName],
    /// Capability labels surfaced in the prompt status block.
    pub features: &'static [&'static str],
    pub base_prompt: &'static str,
    pub model_id: &'static str,
    pub temperature: f32,
    pub max_steps: u32,
}

const GENERAL: AgentDefinition = AgentDefinition {
    agent_type: AgentType::General,
    allowed_tools: &[
        ToolName::Chart,
        ToolName::WebSearch,
        ToolName::Extract,
        ToolName::Scrape,
        ToolName::DeepResearch,
        ToolName::CreateDocument,
        ToolName::UpdateDocument,
        ToolName::ProcessFile,
        ToolName::GetWeather,
        ToolName::RequestSuggestions,
        ToolName::GenerateImage,
        ToolName::EditImage,
    ],
    features: &["charts", "documents", "image_generation", "deep_research"],
    base_prompt: "You are a helpful assistant. Answer concisely and use the \
available tools when they would improve the answer. Prefer citing sources \
for factual claims.",
    model_id: "gpt-4o",
    temperature: 0.7,
    max_steps: 8,
};

const RESEARCH: AgentDefinition = AgentDefinition {
    agent_type: AgentType::Research,
    allowed_tools: &[
        ToolName::WebSearch,
        ToolName::Extract,
        ToolName::Scrape,
        ToolName::DeepResearch,
        ToolName::CreateDocument,
        ToolName::UpdateDocument,
    ],
    features: &["deep_research", "documents"],
    base_prompt: "You are a research assistant. Break questions into search \
steps, gather evidence with the web tools, and synthesize findings with \
inline citations. State uncertainty explicitly.",
    model_id: "gpt-4o",
    temperature: 0.3,
    max_steps: 16,
};

const VISION: AgentDefinition = AgentDefinition {
    agent_type: AgentType::Vision,
    allowed_tools: &[
        ToolName::GenerateImage,
        ToolName::EditImage,
        ToolName::ProcessFile,
    ],
    features: &["image_generation", "image_editing"],
    base_prompt: "You are a visual assistant. Describe images precisely and \
use the image tools for generation or editing requests.",
    model_id: "gpt-4o",
    temperature: 0.7,
    max_steps: 4,
};

const DOCUMENT: AgentDefinition = AgentDefinition {
    agent_type: AgentType::Document,
    allowed_tools: &[
        ToolName::CreateDocument,
        ToolName::UpdateDocument,
        ToolName::RequestSuggestions,
        ToolName::ProcessFile,
        ToolName::Chart,
    ],
    features: &["documents", "charts"],
    base_prompt: "You are a writing assistant working inside a shared \
document. Keep edits minimal and preserve the author's voice.",
    model_id: "gpt-4o",
    temperature: 0.5,
    max_steps: 6,
};

/// Resolve a model selector to its agent. Never fails: unknown selectors
/// get the general agent.
pub fn agent_for_selector(selector: &str) -> &'static AgentDefinition {
    match selector {
        "chat-model-research" | "research-model" => &RESEARCH,
        "chat-model-vision" | "vision-model" => &VISION,
        "chat-model-document" | "document-model" => &DOCUMENT,
        _ => &GENERAL,
    }
}

pub fn definition_of(agent_type: AgentType) -> &'static AgentDefinition {
    match agent_type {
        AgentType::General => &GENERAL,
        AgentType::Research => &RESEARCH,
        AgentType::Vision => &VISION,
        AgentType::Document => &DOCUMENT,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
