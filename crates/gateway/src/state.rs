use std::sync::Arc;

use cr_domain::config::Config;
use cr_providers::ModelProvider;
use cr_store::ChatStore;

use crate::runtime::streams::StreamRegistry;
use crate::signing::UrlSigner;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Chat persistence collaborator.
    pub store: Arc<dyn ChatStore>,
    /// Model provider collaborator.
    pub provider: Arc<dyn ModelProvider>,
    /// Presigned-URL signing collaborator.
    pub signer: Arc<dyn UrlSigner>,

    /// Resumable response stream buffers.
    pub streams: Arc<StreamRegistry>,

    /// HTTP client for non-image file fetches during normalization.
    pub fetcher: reqwest::Client,

    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}
