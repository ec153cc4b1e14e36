//! Configuration types for batchjobs

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{BatchError, GpuJobParams, NfsJobParams};

/// Default REST endpoint of the Batch service
pub const DEFAULT_ENDPOINT: &str = "https://batch.googleapis.com";

/// Region the samples run in unless told otherwise
pub const DEFAULT_REGION: &str = "europe-central2";

/// Top-level configuration file
///
/// Every section is optional:
///
/// ```toml
/// [client]
/// project = "my-project"
/// region = "us-central1"
///
/// [nfs]
/// nfs_ip_address = "10.0.0.2"
/// nfs_path = "/share"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Service connection settings
    pub client: ClientConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Overrides for the NFS sample
    pub nfs: NfsJobParams,
    /// Overrides for the GPU sample
    pub gpu: GpuJobParams,
}

impl BatchConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, BatchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BatchError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, BatchError> {
        toml::from_str(content)
            .map_err(|e| BatchError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Batch service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API
    pub endpoint: String,
    /// Project id or number; resolved from the environment when unset
    pub project: Option<String>,
    /// Region jobs are created in
    pub region: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Fixed OAuth access token, bypassing credential discovery
    pub access_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project: None,
            region: DEFAULT_REGION.to_string(),
            timeout_secs: 60,
            access_token: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or `tracing` filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
