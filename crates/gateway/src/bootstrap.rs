//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use cr_domain::config::Config;
use cr_providers::{ModelProvider, OpenAiProvider};
use cr_store::{ChatStore, FileChatStore};

use crate::api::auth::hash_token;
use crate::runtime::streams::StreamRegistry;
use crate::signing::{SigningClient, UrlSigner};
use crate::state::AppState;

/// Initialize every subsystem and return a fully-wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Chat store ───────────────────────────────────────────────────
    let store: Arc<dyn ChatStore> = Arc::new(
        FileChatStore::new(&config.storage.state_path).context("initializing chat store")?,
    );
    tracing::info!(path = %config.storage.state_path.display(), "chat store ready");

    // ── Model provider ───────────────────────────────────────────────
    let provider: Arc<dyn ModelProvider> =
        Arc::new(OpenAiProvider::new(&config.model, "gpt-4o").context("initializing provider")?);
    tracing::info!(base_url = %config.model.base_url, "model provider ready");

    // ── Signing client ───────────────────────────────────────────────
    let signer: Arc<dyn UrlSigner> =
        Arc::new(SigningClient::new(&config.signing).context("initializing signing client")?);

    // ── File fetcher ─────────────────────────────────────────────────
    let fetcher = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.files.fetch_timeout_secs))
        .build()
        .context("building file fetch client")?;

    // ── API token ────────────────────────────────────────────────────
    let api_token_hash = match std::env::var(&config.server.api_token_env) {
        Ok(token) if !token.is_empty() => Some(hash_token(&token)),
        _ => {
            tracing::warn!(
                env = %config.server.api_token_env,
                "no API token configured, running unauthenticated (dev mode)"
            );
            None
        }
    };

    Ok(AppState {
        config,
        store,
        provider,
        signer,
        streams: Arc::new(StreamRegistry::new()),
        fetcher,
        api_token_hash,
    })
}

/// Spawn the periodic stream-buffer sweeper.
pub fn spawn_background_tasks(state: &AppState) {
    let streams = Arc::clone(&state.streams);
    let max_age = Duration::from_secs(state.config.streams.max_buffer_age_secs);
    let interval = Duration::from_secs(state.config.streams.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            streams.sweep(max_age);
        }
    });
}
