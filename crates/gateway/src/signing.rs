//! Client for the URL-signing collaborator.
//!
//! Object-storage URLs (`s3://bucket/key`) cannot be fetched directly; the
//! signing service exchanges them for time-limited HTTPS URLs. The service
//! is external — this client only speaks its one-endpoint contract.

use serde::{Deserialize, Serialize};

use cr_domain::config::SigningConfig;
use cr_domain::error::{Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest<'a> {
    s3_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignResponse {
    presigned_url: String,
}

/// Seam for the signing collaborator, so resolution logic can be exercised
/// against stubs.
#[async_trait::async_trait]
pub trait UrlSigner: Send + Sync {
    async fn presign(&self, storage_url: &str) -> Result<String>;
}

pub struct SigningClient {
    endpoint: String,
    client: reqwest::Client,
}

impl SigningClient {
    pub fn new(cfg: &SigningConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            endpoint: cfg.endpoint.clone(),
            client,
        })
    }

}

#[async_trait::async_trait]
impl UrlSigner for SigningClient {
    /// Exchange one storage URL for a fetchable presigned URL.
    async fn presign(&self, storage_url: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SignRequest { s3_url: storage_url })
            .send()
            .await
            .map_err(|e| Error::Http(format!("signing request: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "signing service answered {}",
                response.status()
            )));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("signing response: {e}")))?;

        if body.presigned_url.is_empty() {
            return Err(Error::Http("signing service returned an empty URL".into()));
        }
        Ok(body.presigned_url)
    }
}
