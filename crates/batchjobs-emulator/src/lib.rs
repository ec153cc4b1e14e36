//! batchjobs-emulator: In-memory emulator of the Cloud Batch REST API
//!
//! This crate serves the job routes of `batch.googleapis.com/v1`:
//! - Job create, get, delete and list
//! - Service-assigned fields (name, uid, timestamps, QUEUED state)
//! - Google-style error envelopes
//!
//! It lets the samples and their tests run without a cloud project.

pub mod rest;
pub mod store;

pub use rest::create_router;
pub use store::JobStore;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// An emulator serving on a local port; stopped when dropped
pub struct LocalEmulator {
    /// Base URL, e.g. `http://127.0.0.1:40123`
    pub base_url: String,
    pub addr: SocketAddr,
    pub store: Arc<JobStore>,
    handle: JoinHandle<()>,
}

impl LocalEmulator {
    /// Start on an ephemeral port of 127.0.0.1
    pub async fn start(require_auth: bool) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::serve(listener, require_auth).await
    }

    /// Serve on an already bound listener
    pub async fn serve(listener: TcpListener, require_auth: bool) -> std::io::Result<Self> {
        let addr = listener.local_addr()?;
        let store = Arc::new(JobStore::new());
        let router = create_router(store.clone(), require_auth);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "Emulator stopped");
            }
        });
        info!(addr = %addr, "Emulator listening");

        Ok(Self {
            base_url: format!("http://{}", addr),
            addr,
            store,
            handle,
        })
    }
}

impl Drop for LocalEmulator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
