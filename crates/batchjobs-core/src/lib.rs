//! batchjobs-core: Core types for the Cloud Batch samples
//!
//! This crate provides the pieces shared by the client, the CLI and the
//! local emulator:
//! - Batch v1 resource types (jobs, task groups, allocation policies, ...)
//! - Sample job builders (NFS job, GPU job on N1)
//! - Accelerator and machine family rules
//! - Configuration types
//! - Error handling

pub mod accelerator;
pub mod config;
pub mod error;
pub mod model;
pub mod samples;
pub mod wire;

pub use accelerator::*;
pub use config::*;
pub use error::*;
pub use model::*;
pub use samples::*;
pub use wire::ProtoDuration;
