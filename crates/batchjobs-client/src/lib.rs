//! batchjobs-client: REST client for the Cloud Batch service
//!
//! This crate talks to `batch.googleapis.com` (or a compatible emulator):
//! - Job create, get, delete and list calls
//! - Access token discovery (env, gcloud, metadata server)
//! - Project id resolution

pub mod auth;
pub mod client;
pub mod gcloud;
pub mod metadata;
pub mod project;

pub use auth::{
    AccessToken, EnvToken, GcloudToken, MetadataToken, StaticToken, TokenChain, TokenProvider,
};
pub use client::BatchServiceClient;
pub use project::ProjectResolver;
