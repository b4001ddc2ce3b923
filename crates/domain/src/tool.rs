//! The closed tool registry.
//!
//! Every tool the platform can hand to a model is a variant of [`ToolName`]
//! with static [`ToolMeta`]. Inclusion rules (toggles, exclusions) are
//! evaluated by the agent resolver in the gateway; this module only carries
//! the facts.

use serde::{Deserialize, Serialize};

/// Tool definition exposed to the model provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    Chart,
    WebSearch,
    Extract,
    Scrape,
    DeepResearch,
    CreateDocument,
    UpdateDocument,
    ProcessFile,
    GetWeather,
    RequestSuggestions,
    GenerateImage,
    EditImage,
}

/// Static facts about one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolMeta {
    pub display_name: &'static str,
    pub description: &'static str,
    /// Whether the client can switch this tool on and off per turn.
    pub toggleable: bool,
    /// Enablement when the toggle key is absent from the request.
    /// Only meaningful for toggleable tools; non-toggleable tools in an
    /// agent's allowed set are always on.
    pub default_on: bool,
    /// Tools that cannot be active in the same turn as this one.
    pub excludes: &'static [ToolName],
    /// Tie-break rank when an exclusion conflict arises; lower wins.
    pub priority: u8,
}

impl ToolName {
    pub const ALL: [ToolName; 12] = [
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
    ];

    /// Wire name (matches the serde rename).
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Chart => "chart",
            ToolName::WebSearch => "web_search",
            ToolName::Extract => "extract",
            ToolName::Scrape => "scrape",
            ToolName::DeepResearch => "deep_research",
            ToolName::CreateDocument => "create_document",
            ToolName::UpdateDocument => "update_document",
            ToolName::ProcessFile => "process_file",
            ToolName::GetWeather => "get_weather",
            ToolName::RequestSuggestions => "request_suggestions",
            ToolName::GenerateImage => "generate_image",
            ToolName::EditImage => "edit_image",
        }
    }

    pub fn meta(self) -> &'static ToolMeta {
        match self {
            ToolName::Chart => &ToolMeta {
                display_name: "Charts",
                description: "Render a chart from tabular data",
                toggleable: true,
                default_on: false,
                excludes: &[],
                priority: 50,
            },
            ToolName::WebSearch => &ToolMeta {
                display_name: "Web search",
                description: "Search the web and return ranked results",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 10,
            },
            ToolName::Extract => &ToolMeta {
                display_name: "Extract",
                description: "Extract structured data from a web page",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 20,
            },
            ToolName::Scrape => &ToolMeta {
                display_name: "Scrape",
                description: "Fetch the raw content of a web page",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 21,
            },
            ToolName::DeepResearch => &ToolMeta {
                display_name: "Deep research",
                description: "Run a multi-step research plan with citations",
                toggleable: true,
                default_on: false,
                excludes: &[ToolName::GenerateImage],
                priority: 30,
            },
            ToolName::CreateDocument => &ToolMeta {
                display_name: "Create document",
                description: "Create a working document for longer output",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 40,
            },
            ToolName::UpdateDocument => &ToolMeta {
                display_name: "Update document",
                description: "Edit a previously created document",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 41,
            },
            ToolName::ProcessFile => &ToolMeta {
                display_name: "Process file",
                description: "Read an uploaded file and answer questions about it",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 42,
            },
            ToolName::GetWeather => &ToolMeta {
                display_name: "Weather",
                description: "Look up the current weather for a location",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 60,
            },
            ToolName::RequestSuggestions => &ToolMeta {
                display_name: "Suggestions",
                description: "Suggest edits for a working document",
                toggleable: false,
                default_on: true,
                excludes: &[],
                priority: 61,
            },
            ToolName::GenerateImage => &ToolMeta {
                display_name: "Image generation",
                description: "Generate an image from a text prompt",
                toggleable: true,
                default_on: false,
                excludes: &[ToolName::DeepResearch],
                priority: 70,
            },
            ToolName::EditImage => &ToolMeta {
                display_name: "Image editing",
                description: "Edit an existing image with a text instruction",
                toggleable: true,
                default_on: false,
                excludes: &[],
                priority: 71,
            },
        }
    }

    /// JSON-schema definition handed to the provider.
    pub fn definition(self) -> ToolDefinition {
        let meta = self.meta();
        ToolDefinition {
            name: self.as_str().to_string(),
            description: meta.description.to_string(),
            parameters: self.parameter_schema(),
        }
    }

    fn parameter_schema(self) -> serde_json::Value {
        match self {
            ToolName::Chart => serde_json::json!({
                "type": "object",
                "properties": {
                    "kind": { "type": "string", "enum": ["bar", "line", "pie"] },
                    "data": { "type": "array", "items": { "type": "object" } },
                    "title": { "type": "string" }
                },
                "required": ["kind", "data"]
            }),
            ToolName::WebSearch => serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "max_results": { "type": "integer", "minimum": 1, "maximum": 20 }
                },
                "required": ["query"]
            }),
            ToolName::Extract | ToolName::Scrape => serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" },
                    "prompt": { "type": "string" }
                },
                "required": ["url"]
            }),
            ToolName::DeepResearch => serde_json::json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string" },
                    "depth": { "type": "integer", "minimum": 1, "maximum": 5 }
                },
                "required": ["topic"]
            }),
            ToolName::CreateDocument => serde_json::json!({
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "kind": { "type": "string", "enum": ["text", "code", "sheet"] }
                },
                "required": ["title", "kind"]
            }),
            ToolName::UpdateDocument => serde_json::json!({
                "type": "object",
                "properties": {
                    "document_id": { "type": "string" },
                    "description": { "type": "string" }
                },
                "required": ["document_id", "description"]
            }),
            ToolName::ProcessFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string" },
                    "question": { "type": "string" }
                },
                "required": ["url"]
            }),
            ToolName::GetWeather => serde_json::json!({
                "type": "object",
                "properties": {
                    "latitude": { "type": "number" },
                    "longitude": { "type": "number" }
                },
                "required": ["latitude", "longitude"]
            }),
            ToolName::RequestSuggestions => serde_json::json!({
                "type": "object",
                "properties": {
                    "document_id": { "type": "string" }
                },
                "required": ["document_id"]
            }),
            ToolName::GenerateImage | ToolName::EditImage => serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string" },
                    "image_url": { "type": "string" }
                },
                "required": ["prompt"]
            }),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
