//! Batch service REST client

use batchjobs_core::{
    location_name, validate_job, ApiErrorBody, BatchError, BatchResult, ClientConfig, Job,
    ListJobsResponse, Operation,
};
use futures::{stream, Stream, TryStreamExt};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{StaticToken, TokenChain, TokenProvider};
use crate::project::ProjectResolver;

/// Client for `batch.googleapis.com/v1`
pub struct BatchServiceClient {
    base_url: String,
    region: String,
    client: reqwest::Client,
    auth: Arc<dyn TokenProvider>,
    project: ProjectResolver,
}

impl BatchServiceClient {
    /// Create a client from configuration, discovering credentials unless a
    /// token is configured
    pub fn new(config: &ClientConfig) -> BatchResult<Self> {
        let auth: Arc<dyn TokenProvider> = match &config.access_token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(TokenChain::default_chain()?),
        };
        Self::with_token_provider(config, auth)
    }

    /// Create a client with an explicit token provider
    pub fn with_token_provider(
        config: &ClientConfig,
        auth: Arc<dyn TokenProvider>,
    ) -> BatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("batchjobs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BatchError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            client,
            auth,
            project: ProjectResolver::new(config.project.clone()),
        })
    }

    /// Replace the project resolver
    pub fn with_project_resolver(mut self, project: ProjectResolver) -> Self {
        self.project = project;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Project id or number the client works in
    pub async fn project_id(&self) -> BatchResult<String> {
        self.project.resolve().await
    }

    /// `projects/{project}/locations/{region}` for the configured region
    pub async fn parent(&self) -> BatchResult<String> {
        Ok(location_name(&self.project_id().await?, &self.region))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> BatchResult<reqwest::Response> {
        let token = self.auth.token().await?;
        request
            .bearer_auth(token.token)
            .send()
            .await
            .map_err(http_error)
    }

    /// Create a job under `parent`
    pub async fn create_job(&self, parent: &str, job_id: &str, job: &Job) -> BatchResult<Job> {
        validate_job(job_id, job)?;

        info!(parent = %parent, job_id = %job_id, "Creating job");
        let request = self
            .client
            .post(self.url(&format!("{}/jobs", parent)))
            .query(&[("jobId", job_id)])
            .json(job);

        decode(self.send(request).await?).await
    }

    /// Fetch a job by its full resource name
    pub async fn get_job(&self, name: &str) -> BatchResult<Job> {
        debug!(job = %name, "Getting job");
        let request = self.client.get(self.url(name));
        decode(self.send(request).await?).await
    }

    /// Delete a job; the returned operation tracks the deletion
    pub async fn delete_job(&self, name: &str) -> BatchResult<Operation> {
        info!(job = %name, "Deleting job");
        let request = self.client.delete(self.url(name));
        decode(self.send(request).await?).await
    }

    /// Fetch one page of jobs
    pub async fn list_jobs(
        &self,
        parent: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> BatchResult<ListJobsResponse> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(size) = page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        debug!(parent = %parent, page_token = ?page_token, "Listing jobs");
        let request = self
            .client
            .get(self.url(&format!("{}/jobs", parent)))
            .query(&query);

        let page: ListJobsResponse = decode(self.send(request).await?).await?;
        if !page.unreachable.is_empty() {
            warn!(locations = ?page.unreachable, "Some locations were unreachable");
        }
        Ok(page)
    }

    /// Pages of jobs, following `nextPageToken` until the last page
    pub fn job_pages<'a>(
        &'a self,
        parent: &'a str,
        page_size: Option<u32>,
    ) -> impl Stream<Item = BatchResult<Vec<Job>>> + 'a {
        stream::try_unfold(Some(String::new()), move |token| async move {
            let Some(token) = token else {
                return Ok(None);
            };
            let page_token = (!token.is_empty()).then_some(token.as_str());
            let page = self.list_jobs(parent, page_size, page_token).await?;
            let next = (!page.next_page_token.is_empty()).then(|| page.next_page_token.clone());
            Ok(Some((page.jobs, next)))
        })
    }

    /// Every job under `parent`
    pub async fn list_all_jobs(&self, parent: &str) -> BatchResult<Vec<Job>> {
        let pages: Vec<Vec<Job>> = self.job_pages(parent, None).try_collect().await?;
        Ok(pages.into_iter().flatten().collect())
    }
}

fn http_error(err: reqwest::Error) -> BatchError {
    BatchError::Http(err.to_string())
}

/// Turn a response into `T`, or into an error carrying the service's message
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> BatchResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(http_error)?;

    if status.is_success() {
        return Ok(serde_json::from_str(&body)?);
    }

    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body,
    };
    debug!(status = %status, message = %message, "Request failed");

    if status == StatusCode::NOT_FOUND {
        Err(BatchError::NotFound(message))
    } else {
        Err(BatchError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> BatchServiceClient {
        let config = ClientConfig {
            endpoint: endpoint.to_string(),
            project: Some("test-project".to_string()),
            ..Default::default()
        };
        BatchServiceClient::with_token_provider(&config, Arc::new(StaticToken::new("t"))).unwrap()
    }

    #[test]
    fn test_url() {
        let client = client("https://batch.googleapis.com/");
        assert_eq!(
            client.url("projects/p/locations/l/jobs"),
            "https://batch.googleapis.com/v1/projects/p/locations/l/jobs"
        );
    }

    #[tokio::test]
    async fn test_parent() {
        let client = client("http://localhost");
        assert_eq!(
            client.parent().await.unwrap(),
            "projects/test-project/locations/europe-central2"
        );
    }

    #[tokio::test]
    async fn test_invalid_job_rejected_before_sending() {
        // Nothing listens on port 1, so only local validation can answer
        let client = client("http://127.0.0.1:1");
        let err = client
            .create_job("projects/p/locations/l", "Bad_Id", &Job::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));
    }
}
