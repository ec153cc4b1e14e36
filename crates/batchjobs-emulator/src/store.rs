//! In-memory job store

use batchjobs_core::{
    location_name, validate_job, BatchError, BatchResult, Job, JobName, JobStatus,
    ListJobsResponse, LocationPolicy, State, StatusEvent,
};
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Largest page the store hands out
pub const MAX_PAGE_SIZE: usize = 100;

/// Jobs keyed by full resource name
pub struct JobStore {
    jobs: RwLock<BTreeMap<String, Job>>,
}

impl JobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Accept a new job the way the service does: assign output-only fields
    /// and queue it
    pub async fn create(
        &self,
        project: &str,
        location: &str,
        job_id: &str,
        mut job: Job,
    ) -> BatchResult<Job> {
        validate_job(job_id, &job)?;

        let name = JobName::new(project, location, job_id).to_string();
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&name) {
            return Err(BatchError::Api {
                status: 409,
                message: format!("Resource '{}' already exists", name),
            });
        }

        let now = Utc::now();
        job.name = name.clone();
        job.uid = format!("{}-{}", job_id, Uuid::new_v4().simple());
        job.create_time = Some(now);
        job.update_time = Some(now);
        job.status = Some(JobStatus {
            state: State::Queued,
            status_events: vec![StatusEvent {
                event_type: "STATUS_CHANGED".to_string(),
                description: "Job state is set from STATE_UNSPECIFIED to QUEUED".to_string(),
                event_time: Some(now),
            }],
            ..Default::default()
        });

        for (index, group) in job.task_groups.iter_mut().enumerate() {
            group.name = format!("{}/taskGroups/group{}", name, index);
        }

        let policy = job.allocation_policy.get_or_insert_with(Default::default);
        if policy.location.is_none() {
            policy.location = Some(LocationPolicy {
                allowed_locations: vec![format!("regions/{}", location)],
            });
        }

        info!(job = %name, uid = %job.uid, "Job queued");
        jobs.insert(name, job.clone());
        Ok(job)
    }

    /// Get a job by full name
    pub async fn get(&self, name: &str) -> BatchResult<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(name)
            .cloned()
            .ok_or_else(|| BatchError::NotFound(name.to_string()))
    }

    /// Remove a job, returning it
    pub async fn delete(&self, name: &str) -> BatchResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .remove(name)
            .ok_or_else(|| BatchError::NotFound(name.to_string()))?;
        info!(job = %name, "Job deleted");
        Ok(job)
    }

    /// One page of the jobs under `projects/{project}/locations/{location}`
    ///
    /// Page tokens are decimal offsets into the name-ordered job list.
    pub async fn list(
        &self,
        project: &str,
        location: &str,
        page_size: Option<usize>,
        page_token: Option<&str>,
    ) -> BatchResult<ListJobsResponse> {
        let prefix = format!("{}/jobs/", location_name(project, location));
        let page_size = match page_size {
            Some(0) | None => MAX_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        };
        let offset = match page_token {
            Some(token) if !token.is_empty() => token
                .parse::<usize>()
                .map_err(|_| BatchError::Validation(format!("invalid page token: {}", token)))?,
            _ => 0,
        };

        let jobs = self.jobs.read().await;
        let matching: Vec<&Job> = jobs
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(_, job)| job)
            .collect();

        let page: Vec<Job> = matching
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|job| (*job).clone())
            .collect();
        let next = offset + page.len();
        let next_page_token = if next < matching.len() {
            next.to_string()
        } else {
            String::new()
        };

        debug!(prefix = %prefix, offset, returned = page.len(), "Listed jobs");
        Ok(ListJobsResponse {
            jobs: page,
            next_page_token,
            unreachable: Vec::new(),
        })
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchjobs_core::{gpu_job_n1, nfs_job, GpuJobParams, NfsJobParams};

    #[tokio::test]
    async fn test_create_assigns_output_fields() {
        let store = JobStore::new();
        let job = store
            .create("p", "europe-central2", "batch-nfs-job", nfs_job(&NfsJobParams::default()))
            .await
            .unwrap();

        assert_eq!(job.name, "projects/p/locations/europe-central2/jobs/batch-nfs-job");
        assert!(job.uid.starts_with("batch-nfs-job-"));
        assert_eq!(job.state(), State::Queued);
        assert!(job.create_time.is_some());
        assert_eq!(
            job.task_groups[0].name,
            "projects/p/locations/europe-central2/jobs/batch-nfs-job/taskGroups/group0"
        );
        let location = job.allocation_policy.unwrap().location.unwrap();
        assert_eq!(location.allowed_locations, vec!["regions/europe-central2"]);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let store = JobStore::new();
        let job = gpu_job_n1(&GpuJobParams::default());
        store.create("p", "l", "dup", job.clone()).await.unwrap();

        let err = store.create("p", "l", "dup", job).await.unwrap_err();
        assert!(matches!(err, BatchError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let store = JobStore::new();
        let created = store
            .create("p", "l", "job-a", gpu_job_n1(&GpuJobParams::default()))
            .await
            .unwrap();

        let fetched = store.get(&created.name).await.unwrap();
        assert_eq!(fetched, created);

        store.delete(&created.name).await.unwrap();
        assert!(matches!(
            store.get(&created.name).await,
            Err(BatchError::NotFound(_))
        ));
        assert!(store.delete(&created.name).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_pages_within_parent() {
        let store = JobStore::new();
        let job = gpu_job_n1(&GpuJobParams::default());
        for id in ["job-a", "job-b", "job-c"] {
            store.create("p", "l", id, job.clone()).await.unwrap();
        }
        store.create("p", "other", "job-z", job.clone()).await.unwrap();
        let other = store.list("p", "other", None, None).await.unwrap();
        assert_eq!(other.jobs.len(), 1);

        let first = store.list("p", "l", Some(2), None).await.unwrap();
        assert_eq!(first.jobs.len(), 2);
        assert_eq!(first.next_page_token, "2");

        let second = store
            .list("p", "l", Some(2), Some(&first.next_page_token))
            .await
            .unwrap();
        assert_eq!(second.jobs.len(), 1);
        assert!(second.next_page_token.is_empty());
        assert!(second.jobs[0].name.ends_with("/jobs/job-c"));

        assert!(store.list("p", "l", None, Some("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_jobs() {
        let store = JobStore::new();

        let mut zero_tasks = gpu_job_n1(&GpuJobParams::default());
        zero_tasks.task_groups[0].task_count = 0;
        let err = store.create("p", "l", "zero", zero_tasks).await.unwrap_err();
        assert!(matches!(err, BatchError::Validation(_)));

        let mut no_spec = gpu_job_n1(&GpuJobParams::default());
        no_spec.task_groups[0].task_spec = None;
        assert!(store.create("p", "l", "no-spec", no_spec).await.is_err());

        assert!(store.is_empty().await);
    }
}
