//! Shared domain types for ChatRelay.
//!
//! Everything here is plain data: the conversation model, attachment types,
//! the agent/tool registry, provider stream events, the shared error enum,
//! and the TOML configuration. No I/O lives in this crate.

pub mod agent;
pub mod attachment;
pub mod config;
pub mod error;
pub mod message;
pub mod stream;
pub mod tool;
