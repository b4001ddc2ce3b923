pub mod openai;
pub mod scripted;
pub mod traits;
pub(crate) mod sse;

// Re-exports for convenience.
pub use openai::OpenAiProvider;
pub use scripted::ScriptedProvider;
pub use traits::{ChatRequest, ModelProvider};
