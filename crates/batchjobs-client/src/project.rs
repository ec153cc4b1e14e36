//! Project id resolution

use batchjobs_core::{BatchError, BatchResult};
use tracing::debug;

use crate::gcloud::Gcloud;
use crate::metadata::MetadataServer;

/// Environment variables consulted, in order
pub const PROJECT_ENV_VARS: &[&str] = &["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// Finds the project jobs are created in
///
/// Order: explicit value, environment, `gcloud config`, metadata server.
pub struct ProjectResolver {
    explicit: Option<String>,
    gcloud: Gcloud,
    metadata: Option<MetadataServer>,
}

impl ProjectResolver {
    pub fn new(explicit: Option<String>) -> Self {
        Self {
            explicit: explicit.filter(|p| !p.is_empty()),
            gcloud: Gcloud::default(),
            metadata: MetadataServer::from_env().ok(),
        }
    }

    pub fn with_gcloud(mut self, gcloud: Gcloud) -> Self {
        self.gcloud = gcloud;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<MetadataServer>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Resolve the project id
    pub async fn resolve(&self) -> BatchResult<String> {
        self.resolve_with_env(|var| std::env::var(var).ok()).await
    }

    /// Same as [`resolve`](Self::resolve) with a custom environment lookup
    pub async fn resolve_with_env<F>(&self, lookup: F) -> BatchResult<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project) = &self.explicit {
            return Ok(project.clone());
        }

        if let Some(project) = project_from_env(lookup) {
            debug!(project = %project, "Project taken from environment");
            return Ok(project);
        }

        match self.gcloud.run(&["config", "get-value", "project"]).await {
            Ok(project) if project != "(unset)" => {
                debug!(project = %project, "Project taken from gcloud config");
                return Ok(project);
            }
            Ok(_) => debug!("gcloud has no project configured"),
            Err(e) => debug!(error = %e, "gcloud lookup failed"),
        }

        if let Some(metadata) = &self.metadata {
            match metadata.project_id().await {
                Ok(project) if !project.is_empty() => return Ok(project),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "metadata lookup failed"),
            }
        }

        Err(BatchError::Config(format!(
            "could not determine the project; pass --project or set {}",
            PROJECT_ENV_VARS[0]
        )))
    }
}

/// First non-empty value among [`PROJECT_ENV_VARS`]
pub fn project_from_env<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    PROJECT_ENV_VARS
        .iter()
        .filter_map(|var| lookup(*var))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
