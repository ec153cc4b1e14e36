//! batchjobs emulator
//!
//! Serves an in-memory Cloud Batch API for running the samples offline.

use batchjobs_emulator::create_router;
use batchjobs_emulator::JobStore;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// batchjobs-emulator - local stand-in for the Cloud Batch REST API
#[derive(Parser, Debug)]
#[command(name = "batchjobs-emulator")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to bind the API server
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port for the REST API server
    #[arg(long, default_value_t = 9090)]
    port: u16,

    /// Accept requests without a bearer token
    #[arg(long)]
    allow_anonymous: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Level used when `RUST_LOG` is not set
    fn log_directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(args.log_directive()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Starting batchjobs emulator v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(JobStore::new());
    let router = create_router(store, !args.allow_anonymous);

    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;

    info!("API server listening on {}", addr);
    if args.allow_anonymous {
        info!("Anonymous requests accepted");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
