//! Compute Engine metadata server access

use batchjobs_core::{BatchError, BatchResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default metadata server address
pub const METADATA_URL: &str = "http://metadata.google.internal";

/// Token as served by the metadata server
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataTokenResponse {
    pub access_token: String,
    /// Seconds until expiry
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
}

/// Client for the metadata server of the VM we run on
#[derive(Debug, Clone)]
pub struct MetadataServer {
    client: reqwest::Client,
    base_url: String,
}

impl MetadataServer {
    /// Create a client for the given base URL
    pub fn new(base_url: &str) -> BatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|e| BatchError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Use `GCE_METADATA_HOST` when set, the well-known address otherwise
    pub fn from_env() -> BatchResult<Self> {
        match std::env::var("GCE_METADATA_HOST") {
            Ok(host) if !host.is_empty() => Self::new(&format!("http://{}", host)),
            _ => Self::new(METADATA_URL),
        }
    }

    async fn get(&self, path: &str) -> BatchResult<reqwest::Response> {
        let url = format!("{}/computeMetadata/v1/{}", self.base_url, path);
        debug!(url = %url, "Querying metadata server");

        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| BatchError::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(BatchError::Auth(format!(
                "metadata server answered {} for {}",
                response.status(),
                path
            )));
        }
        Ok(response)
    }

    /// Access token of the VM's default service account
    pub async fn token(&self) -> BatchResult<MetadataTokenResponse> {
        self.get("instance/service-accounts/default/token")
            .await?
            .json()
            .await
            .map_err(|e| BatchError::Auth(format!("bad token from metadata server: {}", e)))
    }

    /// Project the VM belongs to
    pub async fn project_id(&self) -> BatchResult<String> {
        let text = self
            .get("project/project-id")
            .await?
            .text()
            .await
            .map_err(|e| BatchError::Auth(format!("bad project id from metadata server: {}", e)))?;
        Ok(text.trim().to_string())
    }
}
