//! Sample job builders
//!
//! Each builder turns a small parameter struct into a complete [`Job`]
//! ready to be sent with "create job". Parameters default to the values the
//! samples are documented with.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::accelerator::check_accelerators;
use crate::{
    Accelerator, AllocationPolicy, BatchError, BatchResult, ComputeResource, InstancePolicy,
    InstancePolicyOrTemplate, Job, LogsPolicy, ProtoDuration, Runnable, TaskGroup, TaskSpec,
    Volume,
};

/// Parameters of the NFS sample job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NfsJobParams {
    /// Job id, unique per project and region
    pub job_name: String,
    /// Exported directory on the NFS server
    pub nfs_path: String,
    /// IP address of the NFS server
    pub nfs_ip_address: String,
    /// Where tasks see the share
    pub mount_path: String,
    pub machine_type: String,
    pub task_count: u64,
    /// Milli-CPUs per task; 500 is half a CPU
    pub cpu_milli: u64,
    /// MiB per task
    pub memory_mib: u64,
    pub max_retry_count: u32,
    pub max_run_duration_secs: u64,
}

impl Default for NfsJobParams {
    fn default() -> Self {
        Self {
            job_name: "batch-nfs-job".to_string(),
            nfs_path: "/your_nfs_path".to_string(),
            nfs_ip_address: "0.0.0.0".to_string(),
            mount_path: "/mnt/disks".to_string(),
            machine_type: "e2-standard-4".to_string(),
            task_count: 3,
            cpu_milli: 500,
            memory_mib: 16,
            max_retry_count: 2,
            max_run_duration_secs: 3600,
        }
    }
}

/// Parameters of the GPU-on-N1 sample job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuJobParams {
    pub job_name: String,
    pub machine_type: String,
    /// Accelerator type, e.g. `nvidia-tesla-t4`
    pub gpu_type: String,
    pub gpu_count: u64,
    /// Let the service install GPU drivers on the VMs
    pub install_gpu_drivers: bool,
    pub task_count: u64,
    pub parallelism: u64,
}

impl Default for GpuJobParams {
    fn default() -> Self {
        Self {
            job_name: "batch-gpu-job-n1".to_string(),
            machine_type: "n1-standard-16".to_string(),
            gpu_type: "nvidia-tesla-t4".to_string(),
            gpu_count: 1,
            install_gpu_drivers: false,
            task_count: 3,
            parallelism: 1,
        }
    }
}

fn sample_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("env".to_string(), "testing".to_string()),
        ("type".to_string(), "script".to_string()),
    ])
}

/// Build the NFS sample: script tasks writing into a mounted NFS share
pub fn nfs_job(params: &NfsJobParams) -> Job {
    let mount_path = params.mount_path.trim_end_matches('/');
    let runnable = Runnable::script(format!(
        "echo Hello world from task ${{BATCH_TASK_INDEX}}. >> {}/output_task_${{BATCH_TASK_INDEX}}.txt",
        mount_path
    ));

    let task = TaskSpec {
        runnables: vec![runnable],
        volumes: vec![Volume::nfs(
            params.nfs_ip_address.as_str(),
            params.nfs_path.as_str(),
            params.mount_path.as_str(),
        )],
        compute_resource: Some(ComputeResource {
            cpu_milli: params.cpu_milli,
            memory_mib: params.memory_mib,
            boot_disk_mib: 0,
        }),
        max_retry_count: params.max_retry_count,
        max_run_duration: Some(ProtoDuration::from_secs(params.max_run_duration_secs)),
        ..Default::default()
    };

    let policy = InstancePolicy {
        machine_type: params.machine_type.clone(),
        ..Default::default()
    };

    Job {
        task_groups: vec![TaskGroup {
            task_spec: Some(task),
            task_count: params.task_count,
            ..Default::default()
        }],
        allocation_policy: Some(AllocationPolicy {
            instances: vec![InstancePolicyOrTemplate {
                policy: Some(policy),
                ..Default::default()
            }],
            ..Default::default()
        }),
        labels: sample_labels(),
        logs_policy: Some(LogsPolicy::cloud_logging()),
        ..Default::default()
    }
}

/// Build the GPU sample: script tasks on N1 VMs with attached GPUs
pub fn gpu_job_n1(params: &GpuJobParams) -> Job {
    let runnable = Runnable::script(
        "echo Hello world! This is task ${BATCH_TASK_INDEX}. \
         This job has a total of ${BATCH_TASK_COUNT} tasks.",
    );

    let policy = InstancePolicy {
        machine_type: params.machine_type.clone(),
        accelerators: vec![Accelerator::new(
            params.gpu_type.as_str(),
            params.gpu_count,
        )],
        ..Default::default()
    };

    Job {
        task_groups: vec![TaskGroup {
            task_spec: Some(TaskSpec {
                runnables: vec![runnable],
                ..Default::default()
            }),
            task_count: params.task_count,
            parallelism: params.parallelism,
            ..Default::default()
        }],
        allocation_policy: Some(AllocationPolicy {
            instances: vec![InstancePolicyOrTemplate {
                policy: Some(policy),
                install_gpu_drivers: params.install_gpu_drivers,
                ..Default::default()
            }],
            ..Default::default()
        }),
        labels: sample_labels(),
        logs_policy: Some(LogsPolicy::cloud_logging()),
        ..Default::default()
    }
}

/// Check a job id against the service's naming rules
///
/// 1 to 63 characters, lowercase letters, digits and hyphens, starting with
/// a letter and not ending with a hyphen.
pub fn validate_job_id(job_id: &str) -> BatchResult<()> {
    let invalid = |reason: &str| {
        Err(BatchError::Validation(format!(
            "invalid job id {:?}: {}",
            job_id, reason
        )))
    };

    if job_id.is_empty() || job_id.len() > 63 {
        return invalid("must be 1 to 63 characters long");
    }
    if !job_id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return invalid("must start with a lowercase letter");
    }
    if job_id.ends_with('-') {
        return invalid("must not end with a hyphen");
    }
    if !job_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return invalid("may only contain lowercase letters, digits and hyphens");
    }
    Ok(())
}

/// Validate a job before it is sent to the service
pub fn validate_job(job_id: &str, job: &Job) -> BatchResult<()> {
    validate_job_id(job_id)?;

    if job.task_groups.is_empty() {
        return Err(BatchError::Validation(
            "job has no task groups".to_string(),
        ));
    }

    for (index, group) in job.task_groups.iter().enumerate() {
        if group.task_count == 0 {
            return Err(BatchError::Validation(format!(
                "task group {} has a task count of 0",
                index
            )));
        }
        let spec = group.task_spec.as_ref().ok_or_else(|| {
            BatchError::Validation(format!("task group {} has no task spec", index))
        })?;
        validate_task_spec(index, spec)?;
    }

    if let Some(policy) = &job.allocation_policy {
        for instance in &policy.instances {
            if instance.policy.is_some() == instance.instance_template.is_some() {
                return Err(BatchError::Validation(
                    "each allocation entry needs exactly one of policy or instance template"
                        .to_string(),
                ));
            }
            if let Some(policy) = &instance.policy {
                check_accelerators(&policy.machine_type, &policy.accelerators)?;
            }
        }
    }

    Ok(())
}

fn validate_task_spec(group: usize, spec: &TaskSpec) -> BatchResult<()> {
    if spec.runnables.is_empty() {
        return Err(BatchError::Validation(format!(
            "task group {} has no runnables",
            group
        )));
    }
    if spec.runnables.iter().any(|r| r.executable_count() != 1) {
        return Err(BatchError::Validation(format!(
            "task group {}: every runnable needs exactly one of script, container or barrier",
            group
        )));
    }

    if let Some(resources) = &spec.compute_resource {
        if resources.cpu_milli == 0 || resources.memory_mib == 0 {
            return Err(BatchError::Validation(format!(
                "task group {}: cpu and memory requests must be positive",
                group
            )));
        }
    }

    for volume in &spec.volumes {
        if !volume.mount_path.starts_with('/') {
            return Err(BatchError::Validation(format!(
                "mount path {:?} is not absolute",
                volume.mount_path
            )));
        }
        if volume.source_count() != 1 {
            return Err(BatchError::Validation(format!(
                "volume at {} needs exactly one source",
                volume.mount_path
            )));
        }
    }

    Ok(())
}
