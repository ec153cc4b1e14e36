//! End-to-end runs of the `batchjobs` binary
//!
//! The default tests point the binary at a local emulator. The test against
//! the real service is ignored; run it with `cargo test -- --ignored` in an
//! environment with Google Cloud credentials and a default project.

use batchjobs_emulator::LocalEmulator;
use serde_json::{json, Value};
use std::io::Write;
use std::process::Output;
use tokio::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_batchjobs");

async fn run(emulator: &LocalEmulator, args: &[&str]) -> Output {
    Command::new(BIN)
        .args(["--endpoint", emulator.base_url.as_str(), "--project", "test-project"])
        .args(args)
        .env("GOOGLE_OAUTH_ACCESS_TOKEN", "test-token")
        .env_remove("RUST_LOG")
        .env_remove("BATCHJOBS_CONFIG")
        .output()
        .await
        .expect("failed to run batchjobs")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "batchjobs failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

fn assert_gpu_n1_response(response: &Value) {
    let instance = &response["allocationPolicy"]["instances"][0];
    assert_eq!(
        instance["policy"]["accelerators"],
        json!([{
            "type": "nvidia-tesla-t4",
            "count": "1",
            "installGpuDrivers": false,
            "driverVersion": ""
        }])
    );
    assert_eq!(instance["policy"]["machineType"], "n1-standard-16");
    assert_eq!(instance["installGpuDrivers"], false);
}

#[tokio::test]
async fn test_create_gpu_job_n1() {
    let emulator = LocalEmulator::start(true).await.unwrap();

    let output = run(&emulator, &["create-gpu-job-n1"]).await;
    let response = stdout_json(&output);

    assert_gpu_n1_response(&response);
    assert_eq!(
        response["name"],
        "projects/test-project/locations/europe-central2/jobs/batch-gpu-job-n1"
    );
    assert_eq!(response["status"]["state"], "QUEUED");

    let output = run(&emulator, &["delete-job", "batch-gpu-job-n1"]).await;
    assert_eq!(stdout_json(&output)["done"], true);
    assert!(emulator.store.is_empty().await);
}

#[tokio::test]
async fn test_create_nfs_job() {
    let emulator = LocalEmulator::start(true).await.unwrap();

    let output = run(
        &emulator,
        &[
            "--region",
            "us-central1",
            "create-nfs-job",
            "--nfs-ip",
            "10.0.0.2",
            "--nfs-path",
            "/share",
        ],
    )
    .await;
    let response = stdout_json(&output);

    assert_eq!(
        response["name"],
        "projects/test-project/locations/us-central1/jobs/batch-nfs-job"
    );
    let spec = &response["taskGroups"][0]["taskSpec"];
    assert_eq!(
        spec["volumes"][0],
        json!({
            "nfs": {"server": "10.0.0.2", "remotePath": "/share"},
            "mountPath": "/mnt/disks"
        })
    );
    assert_eq!(spec["computeResource"]["cpuMilli"], "500");
    assert_eq!(spec["maxRunDuration"], "3600s");
    assert_eq!(response["taskGroups"][0]["taskCount"], "3");
    assert_eq!(response["labels"], json!({"env": "testing", "type": "script"}));
    assert_eq!(response["logsPolicy"]["destination"], "CLOUD_LOGGING");

    let output = run(
        &emulator,
        &["--region", "us-central1", "get-job", "batch-nfs-job"],
    )
    .await;
    assert_eq!(stdout_json(&output)["uid"], response["uid"]);
}

#[tokio::test]
async fn test_create_twice_fails() {
    let emulator = LocalEmulator::start(true).await.unwrap();

    let first = run(&emulator, &["create-gpu-job-n1", "--job-name", "twice"]).await;
    assert!(first.status.success());

    let second = run(&emulator, &["create-gpu-job-n1", "--job-name", "twice"]).await;
    assert!(!second.status.success());
    assert!(second.stdout.is_empty());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));
}

#[tokio::test]
async fn test_invalid_gpu_request_never_reaches_service() {
    let emulator = LocalEmulator::start(true).await.unwrap();

    let output = run(
        &emulator,
        &["create-gpu-job-n1", "--machine-type", "g2-standard-8"],
    )
    .await;
    assert!(!output.status.success());
    assert!(emulator.store.is_empty().await);
}

#[tokio::test]
async fn test_config_file_overrides_defaults() {
    let emulator = LocalEmulator::start(true).await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[client]\nregion = \"asia-east1\"\n\n[gpu]\njob_name = \"from-config\"\ngpu_count = 2"
    )
    .unwrap();
    let config = file.path().to_str().unwrap();

    let output = run(&emulator, &["--config", config, "create-gpu-job-n1"]).await;
    let response = stdout_json(&output);
    assert_eq!(
        response["name"],
        "projects/test-project/locations/asia-east1/jobs/from-config"
    );
    assert_eq!(
        response["allocationPolicy"]["instances"][0]["policy"]["accelerators"][0]["count"],
        "2"
    );
}

#[tokio::test]
async fn test_install_gpu_drivers_flag_overrides_config() {
    let emulator = LocalEmulator::start(true).await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[gpu]\ninstall_gpu_drivers = true").unwrap();
    let config = file.path().to_str().unwrap();

    let output = run(
        &emulator,
        &["--config", config, "create-gpu-job-n1", "--job-name", "from-file"],
    )
    .await;
    let response = stdout_json(&output);
    assert_eq!(response["allocationPolicy"]["instances"][0]["installGpuDrivers"], true);

    let output = run(
        &emulator,
        &[
            "--config",
            config,
            "create-gpu-job-n1",
            "--job-name",
            "flag-off",
            "--install-gpu-drivers=false",
        ],
    )
    .await;
    let response = stdout_json(&output);
    assert_eq!(response["allocationPolicy"]["instances"][0]["installGpuDrivers"], false);

    let output = run(
        &emulator,
        &["create-gpu-job-n1", "--job-name", "flag-on", "--install-gpu-drivers"],
    )
    .await;
    let response = stdout_json(&output);
    assert_eq!(response["allocationPolicy"]["instances"][0]["installGpuDrivers"], true);
}

#[tokio::test]
async fn test_print_request_is_offline() {
    let output = Command::new(BIN)
        .args(["--project", "my-project", "print-request", "gpu-n1"])
        .env_remove("RUST_LOG")
        .env_remove("BATCHJOBS_CONFIG")
        .output()
        .await
        .unwrap();
    let request = stdout_json(&output);

    assert_eq!(request["parent"], "projects/my-project/locations/europe-central2");
    assert_eq!(request["jobId"], "batch-gpu-job-n1");
    assert_gpu_n1_response(&request["job"]);
}

async fn run_on_cloud(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(["--region", "europe-central2"])
        .args(args)
        .output()
        .await
        .expect("failed to run batchjobs")
}

#[tokio::test]
#[ignore = "creates a job in a real Google Cloud project"]
async fn test_create_gpu_job_n1_on_cloud_batch() {
    let output = run_on_cloud(&["create-gpu-job-n1"]).await;
    let response = stdout_json(&output);

    let cleanup = run_on_cloud(&["delete-job", "batch-gpu-job-n1"]).await;

    assert_gpu_n1_response(&response);
    assert!(cleanup.status.success());
}
