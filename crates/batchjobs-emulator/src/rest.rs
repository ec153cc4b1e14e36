//! REST API handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use batchjobs_core::{
    ApiErrorBody, BatchError, Job, JobName, ListJobsResponse, Operation,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::JobStore;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<JobStore>,
}

/// Create the API router
///
/// With `require_auth`, requests without a bearer token are rejected the way
/// the real service rejects them.
pub fn create_router(store: Arc<JobStore>, require_auth: bool) -> Router {
    let state = Arc::new(AppState { store });

    let router = Router::new()
        .route(
            "/v1/projects/:project/locations/:location/jobs",
            get(list_jobs).post(create_job),
        )
        .route(
            "/v1/projects/:project/locations/:location/jobs/:job",
            get(get_job).delete(delete_job),
        )
        .with_state(state);

    let router = if require_auth {
        router.layer(middleware::from_fn(require_bearer))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Error response in the Google API envelope
pub struct ApiError(StatusCode, ApiErrorBody);

impl ApiError {
    fn new(status: StatusCode, code_name: &str, message: impl Into<String>) -> Self {
        Self(status, ApiErrorBody::new(status.as_u16(), code_name, message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NotFound(name) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Resource '{}' was not found", name),
            ),
            BatchError::Validation(msg) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg)
            }
            BatchError::Api { status: 409, message } => {
                ApiError::new(StatusCode::CONFLICT, "ALREADY_EXISTS", message)
            }
            other => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                other.to_string(),
            ),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_ARGUMENT",
            format!("Invalid JSON payload received. {}", rejection.body_text()),
        )
    }
}

async fn require_bearer(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map_or(false, |token| !token.trim().is_empty());

    if !authorized {
        warn!(path = %request.uri().path(), "Rejecting unauthenticated request");
        return ApiError::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "Request is missing required authentication credential.",
        )
        .into_response();
    }
    next.run(request).await
}

/// Query parameters of jobs.create
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobQuery {
    pub job_id: Option<String>,
    pub request_id: Option<String>,
}

/// Create a new job
async fn create_job(
    State(state): State<Arc<AppState>>,
    Path((project, location)): Path<(String, String)>,
    Query(query): Query<CreateJobQuery>,
    payload: Result<Json<Job>, JsonRejection>,
) -> Result<Json<Job>, ApiError> {
    let Json(job) = payload?;
    // The service generates an id when none is given
    let job_id = query
        .job_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("job-{}", Uuid::new_v4().simple()));

    info!(
        project = %project,
        location = %location,
        job_id = %job_id,
        request_id = ?query.request_id,
        "Creating job"
    );

    let job = state.store.create(&project, &location, &job_id, job).await?;
    Ok(Json(job))
}

/// Get a specific job
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path((project, location, job)): Path<(String, String, String)>,
) -> Result<Json<Job>, ApiError> {
    let name = JobName::new(&project, &location, &job).to_string();
    Ok(Json(state.store.get(&name).await?))
}

/// Delete a job
async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path((project, location, job)): Path<(String, String, String)>,
) -> Result<Json<Operation>, ApiError> {
    let name = JobName::new(&project, &location, &job);
    state.store.delete(&name.to_string()).await?;

    let now = Utc::now().to_rfc3339();
    Ok(Json(Operation {
        name: format!("{}/operations/{}", name.parent(), Uuid::new_v4()),
        done: true,
        metadata: Some(serde_json::json!({
            "@type": "type.googleapis.com/google.cloud.batch.v1.OperationMetadata",
            "createTime": now,
            "endTime": now,
            "target": name.to_string(),
            "verb": "delete",
            "apiVersion": "v1",
        })),
        error: None,
        response: Some(serde_json::json!({
            "@type": "type.googleapis.com/google.protobuf.Empty"
        })),
    }))
}

/// Query parameters of jobs.list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    pub page_size: Option<usize>,
    pub page_token: Option<String>,
    pub filter: Option<String>,
}

/// List jobs in a location
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path((project, location)): Path<(String, String)>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
        warn!(filter = %filter, "List filters are not supported; returning all jobs");
    }

    let page = state
        .store
        .list(
            &project,
            &location,
            query.page_size,
            query.page_token.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use batchjobs_core::{gpu_job_n1, GpuJobParams, State as JobState};
    use tower::ServiceExt;

    const JOBS: &str = "/v1/projects/p/locations/europe-central2/jobs";

    fn router() -> Router {
        create_router(Arc::new(JobStore::new()), true)
    }

    fn create_request(job_id: &str) -> HttpRequest<Body> {
        let body = serde_json::to_vec(&gpu_job_n1(&GpuJobParams::default())).unwrap();
        HttpRequest::post(format!("{}?jobId={}", JOBS, job_id))
            .header(header::AUTHORIZATION, "Bearer test")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_job() {
        let response = router()
            .oneshot(create_request("batch-gpu-job-n1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let job: Job = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(
            job.name,
            "projects/p/locations/europe-central2/jobs/batch-gpu-job-n1"
        );
        assert_eq!(job.state(), JobState::Queued);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let request = HttpRequest::get(JOBS).body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"]["status"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let store = Arc::new(JobStore::new());
        let app = create_router(store, true);

        let first = app.clone().oneshot(create_request("dup")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(create_request("dup")).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error"]["status"], "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_invalid_job_id_is_bad_request() {
        let response = router()
            .oneshot(create_request("Not_Valid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["status"],
            "INVALID_ARGUMENT"
        );
    }

    fn post_body(body: &'static str) -> HttpRequest<Body> {
        HttpRequest::post(format!("{}?jobId=bad-body", JOBS))
            .header(header::AUTHORIZATION, "Bearer test")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_job_breaking_invariants_is_bad_request() {
        let response = router()
            .oneshot(post_body(r#"{"taskGroups":[{"taskCount":"0"}]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["status"],
            "INVALID_ARGUMENT"
        );
    }

    #[tokio::test]
    async fn test_malformed_body_uses_error_envelope() {
        let response = router()
            .oneshot(post_body(r#"{"taskGroups":"nope"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], 400);
        assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid JSON payload received."));
    }

    #[tokio::test]
    async fn test_get_missing_job_is_not_found() {
        let request = HttpRequest::get(format!("{}/nope", JOBS))
            .header(header::AUTHORIZATION, "Bearer test")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_returns_done_operation() {
        let store = Arc::new(JobStore::new());
        let app = create_router(store.clone(), false);
        app.clone().oneshot(create_request("gone")).await.unwrap();

        let request = HttpRequest::delete(format!("{}/gone", JOBS))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let op: Operation = serde_json::from_value(body_json(response).await).unwrap();
        assert!(op.done);
        assert!(op
            .name
            .starts_with("projects/p/locations/europe-central2/operations/"));
        assert!(store.is_empty().await);
    }
}
