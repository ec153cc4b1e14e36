//! Access token providers
//!
//! Requests to the Batch service carry an OAuth2 bearer token. Providers are
//! tried in order by [`TokenChain`], which also caches the token until shortly
//! before it expires.

use async_trait::async_trait;
use batchjobs_core::{BatchError, BatchResult};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::gcloud::Gcloud;
use crate::metadata::MetadataServer;

/// Environment variable holding a ready-made access token
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// gcloud does not report expiry; its tokens are treated as valid for 50
/// minutes of their one-hour lifetime
const GCLOUD_TOKEN_LIFETIME_SECS: i64 = 3000;

/// A bearer token and, if known, when it stops being valid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn expiring_in(token: impl Into<String>, secs: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Usable at `now`, with a safety margin
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < at,
            None => true,
        }
    }
}

/// Source of access tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch a token
    async fn token(&self) -> BatchResult<AccessToken>;

    /// Get the provider name
    fn name(&self) -> &'static str;
}

/// A fixed token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> BatchResult<AccessToken> {
        Ok(AccessToken::new(self.0.clone()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Token read from an environment variable on every call
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(ACCESS_TOKEN_ENV)
    }
}

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> BatchResult<AccessToken> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(AccessToken::new(token.trim())),
            _ => Err(BatchError::Auth(format!("{} is not set", self.var))),
        }
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// Token from `gcloud auth print-access-token`
#[derive(Default)]
pub struct GcloudToken {
    gcloud: Gcloud,
}

impl GcloudToken {
    pub fn new(gcloud: Gcloud) -> Self {
        Self { gcloud }
    }
}

#[async_trait]
impl TokenProvider for GcloudToken {
    async fn token(&self) -> BatchResult<AccessToken> {
        let token = self.gcloud.run(&["auth", "print-access-token"]).await?;
        Ok(AccessToken::expiring_in(token, GCLOUD_TOKEN_LIFETIME_SECS))
    }

    fn name(&self) -> &'static str {
        "gcloud"
    }
}

/// Token of the VM's service account, from the metadata server
pub struct MetadataToken {
    server: MetadataServer,
}

impl MetadataToken {
    pub fn new(server: MetadataServer) -> Self {
        Self { server }
    }
}

#[async_trait]
impl TokenProvider for MetadataToken {
    async fn token(&self) -> BatchResult<AccessToken> {
        let response = self.server.token().await?;
        Ok(AccessToken::expiring_in(
            response.access_token,
            response.expires_in,
        ))
    }

    fn name(&self) -> &'static str {
        "metadata"
    }
}

/// Tries each provider in turn and caches the first token obtained
pub struct TokenChain {
    providers: Vec<Box<dyn TokenProvider>>,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenChain {
    pub fn new(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self {
            providers,
            cached: RwLock::new(None),
        }
    }

    /// env var, then gcloud, then the metadata server
    pub fn default_chain() -> BatchResult<Self> {
        Ok(Self::new(vec![
            Box::new(EnvToken::default()),
            Box::new(GcloudToken::default()),
            Box::new(MetadataToken::new(MetadataServer::from_env()?)),
        ]))
    }
}

#[async_trait]
impl TokenProvider for TokenChain {
    async fn token(&self) -> BatchResult<AccessToken> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.token().await {
                Ok(token) => {
                    info!(provider = provider.name(), "Obtained access token");
                    *cached = Some(token.clone());
                    return Ok(token);
                }
                Err(e) => {
                    debug!(provider = provider.name(), error = %e, "Token provider failed");
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(BatchError::Auth(format!(
            "no credentials found ({})",
            failures.join("; ")
        )))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
