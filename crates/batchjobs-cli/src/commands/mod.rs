//! CLI commands implementation

use anyhow::Result;
use batchjobs_client::{BatchServiceClient, ProjectResolver};
use batchjobs_core::{
    gpu_job_n1, job_name, location_name, nfs_job, BatchConfig, CreateJobRequest, GpuJobParams,
    Job, NfsJobParams,
};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

/// Samples that `print-request` can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sample {
    /// The NFS job
    Nfs,
    /// The GPU job on N1
    GpuN1,
}

/// Build a client from the effective configuration
pub fn connect(config: &BatchConfig) -> Result<BatchServiceClient> {
    Ok(BatchServiceClient::new(&config.client)?)
}

/// Print a value as one line of JSON on stdout
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Create the NFS sample job
pub async fn create_nfs_job(client: &BatchServiceClient, params: &NfsJobParams) -> Result<()> {
    let parent = client.parent().await?;
    let job = nfs_job(params);

    let created = client.create_job(&parent, &params.job_name, &job).await?;
    info!(job = %created.name, state = %created.state(), "NFS job created");
    print_json(&created)
}

/// Create the GPU-on-N1 sample job
pub async fn create_gpu_job_n1(client: &BatchServiceClient, params: &GpuJobParams) -> Result<()> {
    let parent = client.parent().await?;
    let job = gpu_job_n1(params);

    let created = client.create_job(&parent, &params.job_name, &job).await?;
    info!(job = %created.name, state = %created.state(), "GPU job created");
    print_json(&created)
}

/// Show a job
pub async fn get_job(client: &BatchServiceClient, job: &str) -> Result<()> {
    let name = resolve_job_name(client, job).await?;
    let job = client.get_job(&name).await?;
    print_json(&job)
}

/// Delete a job
pub async fn delete_job(client: &BatchServiceClient, job: &str) -> Result<()> {
    let name = resolve_job_name(client, job).await?;
    let operation = client.delete_job(&name).await?;
    info!(job = %name, operation = %operation.name, "Deletion requested");
    print_json(&operation)
}

/// List jobs in the configured region
pub async fn list_jobs(client: &BatchServiceClient) -> Result<()> {
    let parent = client.parent().await?;
    let jobs = client.list_all_jobs(&parent).await?;

    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!("{:<30} {:<22} {:<25}", "JOB", "STATE", "CREATED");
    println!("{}", "-".repeat(77));
    for job in jobs {
        println!(
            "{:<30} {:<22} {:<25}",
            short_name(&job),
            job.state(),
            job.create_time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Print the request a sample would send, without sending it
pub async fn print_request(config: &BatchConfig, sample: Sample) -> Result<()> {
    let resolver = ProjectResolver::new(config.client.project.clone());
    let project = match resolver.resolve().await {
        Ok(project) => project,
        Err(e) => {
            warn!(error = %e, "Using a placeholder project");
            "PROJECT_ID".to_string()
        }
    };

    let (job_id, job) = match sample {
        Sample::Nfs => (config.nfs.job_name.clone(), nfs_job(&config.nfs)),
        Sample::GpuN1 => (config.gpu.job_name.clone(), gpu_job_n1(&config.gpu)),
    };

    let request = CreateJobRequest {
        parent: location_name(&project, &config.client.region),
        job_id,
        job,
        request_id: None,
    };
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}

/// Accept either a bare job id or a full resource name
async fn resolve_job_name(client: &BatchServiceClient, job: &str) -> Result<String> {
    if job.contains('/') {
        return Ok(job.to_string());
    }
    let project = client.project_id().await?;
    Ok(job_name(&project, client.region(), job))
}

fn short_name(job: &Job) -> &str {
    job.name.rsplit('/').next().unwrap_or(&job.name)
}
