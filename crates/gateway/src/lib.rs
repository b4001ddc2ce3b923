//! ChatRelay gateway: HTTP surface and turn runtime.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod signing;
pub mod state;
