//! Batch v1 resource types
//!
//! These mirror the subset of the `batch.googleapis.com/v1` REST resources
//! the samples build and read back. Field names follow the lowerCamelCase
//! JSON mapping. Fields the service returns that are not modelled here are
//! kept in each resource's `extra` map so a response prints back whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::wire::{int64, is_default, ProtoDuration};
use crate::BatchError;

/// A Batch job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Full resource name, assigned by the service
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Service-assigned unique id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Scheduling priority, 0..=99
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub priority: u64,
    /// Task groups; the service currently accepts exactly one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_groups: Vec<TaskGroup>,
    /// Where and on what kind of VMs the tasks run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_policy: Option<AllocationPolicy>,
    /// User labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Job status, output only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Creation timestamp, output only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    /// Last update timestamp, output only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    /// Where task logs go
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_policy: Option<LogsPolicy>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    /// Current job state, `Unspecified` when the service has not reported one
    pub fn state(&self) -> State {
        self.status.as_ref().map(|s| s.state).unwrap_or_default()
    }

    /// Instance policy of the first allocation entry, if any
    pub fn first_instance(&self) -> Option<&InstancePolicyOrTemplate> {
        self.allocation_policy
            .as_ref()
            .and_then(|p| p.instances.first())
    }
}

/// A group of identical tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    /// Resource name, output only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// What each task runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_spec: Option<TaskSpec>,
    /// Number of tasks in the group
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub task_count: u64,
    /// Maximum number of tasks running at once
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub parallelism: u64,
    /// Maximum number of tasks per VM
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub task_count_per_node: u64,
    #[serde(default, skip_serializing_if = "is_default")]
    pub require_hosts_file: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub permissive_ssh: bool,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Specification shared by every task of a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Executed in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runnables: Vec<Runnable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_resource: Option<ComputeResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_duration: Option<ProtoDuration>,
    /// Retries per task, 0..=10
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_retry_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Environment variables for a task or runnable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

/// One step of a task: a script, a container or a barrier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runnable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier: Option<Barrier>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub ignore_exit_status: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub background: bool,
    #[serde(default, skip_serializing_if = "is_default")]
    pub always_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Runnable {
    /// A runnable executing inline script text
    pub fn script(text: impl Into<String>) -> Self {
        Self {
            script: Some(Script {
                path: None,
                text: Some(text.into()),
            }),
            ..Default::default()
        }
    }

    /// Number of executable kinds set; a valid runnable has exactly one
    pub fn executable_count(&self) -> usize {
        [
            self.script.is_some(),
            self.container.is_some(),
            self.barrier.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Script source: a path on the VM or inline text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub image_uri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Barrier {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// A volume mounted into every task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<Nfs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<Gcs>,
    /// Name of an attached persistent disk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Absolute path the volume is mounted at inside the task
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mount_options: Vec<String>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Volume {
    /// An NFS export mounted at `mount_path`
    pub fn nfs(
        server: impl Into<String>,
        remote_path: impl Into<String>,
        mount_path: impl Into<String>,
    ) -> Self {
        Self {
            nfs: Some(Nfs {
                server: server.into(),
                remote_path: remote_path.into(),
            }),
            mount_path: mount_path.into(),
            ..Default::default()
        }
    }

    pub fn source_count(&self) -> usize {
        [self.nfs.is_some(), self.gcs.is_some(), self.device_name.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
    }
}

/// Network File System source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nfs {
    /// IP address or hostname of the NFS server
    pub server: String,
    /// Exported directory on the server
    pub remote_path: String,
}

/// Cloud Storage bucket source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gcs {
    pub remote_path: String,
}

/// Resources requested by each task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResource {
    /// Milli-CPUs; 1000 is one full CPU
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub cpu_milli: u64,
    /// Memory in MiB
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub memory_mib: u64,
    /// Extra boot disk in MiB
    #[serde(default, with = "int64", skip_serializing_if = "is_default")]
    pub boot_disk_mib: u64,
}

/// Resource allocation for the job's VMs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPolicy>,
    /// Candidate instance policies, tried in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<InstancePolicyOrTemplate>,
    /// Labels applied to the VMs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPolicy {
    /// e.g. `regions/europe-central2` or `zones/europe-central2-b`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_locations: Vec<String>,
}

/// Either an inline instance policy or an instance template name
///
/// `installGpuDrivers` is always written, mirroring the field as returned
/// by the client libraries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePolicyOrTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<InstancePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_template: Option<String>,
    /// Let the service install GPU drivers from a third-party location
    #[serde(default)]
    pub install_gpu_drivers: bool,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// VM shape for a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePolicy {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub machine_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub min_cpu_platform: String,
    #[serde(default, skip_serializing_if = "is_default")]
    pub provisioning_model: ProvisioningModel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accelerators: Vec<Accelerator>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A GPU attached to each VM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accelerator {
    /// Accelerator type, e.g. `nvidia-tesla-t4`
    #[serde(rename = "type")]
    pub accelerator_type: String,
    #[serde(default, with = "int64")]
    pub count: u64,
    /// Deprecated in favour of the flag on `InstancePolicyOrTemplate`
    #[serde(default)]
    pub install_gpu_drivers: bool,
    #[serde(default)]
    pub driver_version: String,
}

impl Accelerator {
    pub fn new(accelerator_type: impl Into<String>, count: u64) -> Self {
        Self {
            accelerator_type: accelerator_type.into(),
            count,
            install_gpu_drivers: false,
            driver_version: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningModel {
    #[default]
    ProvisioningModelUnspecified,
    Standard,
    Spot,
    Preemptible,
}

/// Destination of task logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsPolicy {
    #[serde(default, skip_serializing_if = "is_default")]
    pub destination: Destination,
    /// Only used with `Destination::Path`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logs_path: String,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LogsPolicy {
    pub fn cloud_logging() -> Self {
        Self {
            destination: Destination::CloudLogging,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Destination {
    #[default]
    DestinationUnspecified,
    CloudLogging,
    Path,
}

/// Job status, output only
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub state: State,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_events: Vec<StatusEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_duration: Option<ProtoDuration>,
    /// Unmodelled fields, kept as received
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<DateTime<Utc>>,
}

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    #[default]
    StateUnspecified,
    Queued,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    DeletionInProgress,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::StateUnspecified => write!(f, "STATE_UNSPECIFIED"),
            State::Queued => write!(f, "QUEUED"),
            State::Scheduled => write!(f, "SCHEDULED"),
            State::Running => write!(f, "RUNNING"),
            State::Succeeded => write!(f, "SUCCEEDED"),
            State::Failed => write!(f, "FAILED"),
            State::DeletionInProgress => write!(f, "DELETION_IN_PROGRESS"),
        }
    }
}

/// The full "create job" call: the REST body is `job`, the rest goes in the
/// URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub parent: String,
    pub job_id: String,
    pub job: Job,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsResponse {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreachable: Vec<String>,
}

/// Long-running operation returned by deletes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    /// Canonical code name, e.g. `NOT_FOUND`
    #[serde(default)]
    pub status: String,
}

impl ApiErrorBody {
    pub fn new(code: u16, status: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code,
                message: message.into(),
                status: status.to_string(),
            },
        }
    }
}

/// `projects/{project}/locations/{region}`
pub fn location_name(project: &str, region: &str) -> String {
    format!("projects/{}/locations/{}", project, region)
}

/// `projects/{project}/locations/{region}/jobs/{job_id}`
pub fn job_name(project: &str, region: &str, job_id: &str) -> String {
    format!("{}/jobs/{}", location_name(project, region), job_id)
}

/// Parsed job resource name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobName {
    pub project: String,
    pub location: String,
    pub job_id: String,
}

impl JobName {
    pub fn new(project: &str, location: &str, job_id: &str) -> Self {
        Self {
            project: project.to_string(),
            location: location.to_string(),
            job_id: job_id.to_string(),
        }
    }

    /// The `projects/*/locations/*` parent
    pub fn parent(&self) -> String {
        location_name(&self.project, &self.location)
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/jobs/{}", self.parent(), self.job_id)
    }
}

impl std::str::FromStr for JobName {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            ["projects", project, "locations", location, "jobs", job_id]
                if !project.is_empty() && !location.is_empty() && !job_id.is_empty() =>
            {
                Ok(JobName::new(project, location, job_id))
            }
            _ => Err(BatchError::Validation(format!(
                "not a job resource name: {}",
                s
            ))),
        }
    }
}
