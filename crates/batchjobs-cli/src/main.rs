//! batchjobs CLI
//!
//! Creates the sample Cloud Batch jobs and prints the service's response.

mod commands;

use anyhow::Context;
use batchjobs_core::BatchConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// batchjobs - Cloud Batch job samples
#[derive(Parser, Debug)]
#[command(name = "batchjobs")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "BATCHJOBS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Batch API endpoint
    #[arg(long, env = "BATCHJOBS_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Project id or number
    #[arg(long, global = true)]
    project: Option<String>,

    /// Region to run jobs in
    #[arg(long, global = true)]
    region: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a job whose tasks mount an NFS share
    CreateNfsJob {
        /// Job name, unique per project and region
        #[arg(long)]
        job_name: Option<String>,

        /// Exported directory on the NFS server
        #[arg(long)]
        nfs_path: Option<String>,

        /// IP address of the NFS server
        #[arg(long)]
        nfs_ip: Option<String>,

        /// Where tasks see the share
        #[arg(long)]
        mount_path: Option<String>,
    },

    /// Create a job running on N1 machines with attached GPUs
    CreateGpuJobN1 {
        /// Job name, unique per project and region
        #[arg(long)]
        job_name: Option<String>,

        /// N1 machine type (e.g., n1-standard-16)
        #[arg(long)]
        machine_type: Option<String>,

        /// GPU type (e.g., nvidia-tesla-t4)
        #[arg(long)]
        gpu_type: Option<String>,

        /// Number of GPUs per VM
        #[arg(long)]
        gpu_count: Option<u64>,

        /// Let the service install GPU drivers (`--install-gpu-drivers=false`
        /// turns off a value set in the config file)
        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "true",
            action = clap::ArgAction::Set
        )]
        install_gpu_drivers: Option<bool>,
    },

    /// Show a job
    GetJob {
        /// Job name or full resource name
        job: String,
    },

    /// Delete a job
    DeleteJob {
        /// Job name or full resource name
        job: String,
    },

    /// List jobs in the region
    ListJobs,

    /// Print the create request of a sample without sending it
    PrintRequest {
        #[arg(value_enum)]
        sample: commands::Sample,
    },
}

fn init_logging(verbose: bool, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { level };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    // stdout carries the JSON responses
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BatchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BatchConfig::default(),
    };

    init_logging(cli.verbose, &config.logging.level);

    if let Some(endpoint) = cli.endpoint {
        config.client.endpoint = endpoint;
    }
    if let Some(project) = cli.project {
        config.client.project = Some(project);
    }
    if let Some(region) = cli.region {
        config.client.region = region;
    }

    match cli.command {
        Commands::CreateNfsJob {
            job_name,
            nfs_path,
            nfs_ip,
            mount_path,
        } => {
            let mut params = config.nfs.clone();
            if let Some(v) = job_name {
                params.job_name = v;
            }
            if let Some(v) = nfs_path {
                params.nfs_path = v;
            }
            if let Some(v) = nfs_ip {
                params.nfs_ip_address = v;
            }
            if let Some(v) = mount_path {
                params.mount_path = v;
            }
            let client = commands::connect(&config)?;
            commands::create_nfs_job(&client, &params).await?;
        }
        Commands::CreateGpuJobN1 {
            job_name,
            machine_type,
            gpu_type,
            gpu_count,
            install_gpu_drivers,
        } => {
            let mut params = config.gpu.clone();
            if let Some(v) = job_name {
                params.job_name = v;
            }
            if let Some(v) = machine_type {
                params.machine_type = v;
            }
            if let Some(v) = gpu_type {
                params.gpu_type = v;
            }
            if let Some(v) = gpu_count {
                params.gpu_count = v;
            }
            if let Some(v) = install_gpu_drivers {
                params.install_gpu_drivers = v;
            }
            let client = commands::connect(&config)?;
            commands::create_gpu_job_n1(&client, &params).await?;
        }
        Commands::GetJob { job } => {
            let client = commands::connect(&config)?;
            commands::get_job(&client, &job).await?;
        }
        Commands::DeleteJob { job } => {
            let client = commands::connect(&config)?;
            commands::delete_job(&client, &job).await?;
        }
        Commands::ListJobs => {
            let client = commands::connect(&config)?;
            commands::list_jobs(&client).await?;
        }
        Commands::PrintRequest { sample } => {
            commands::print_request(&config, sample).await?;
        }
    }

    Ok(())
}
