//! Machine families and GPU attachment rules

use serde::{Deserialize, Serialize};

use crate::{Accelerator, BatchError, BatchResult};

/// Compute Engine machine family, derived from the machine type prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineFamily {
    /// General purpose N1; GPUs are attached explicitly
    N1,
    /// Accelerator-optimized A2 (A100)
    A2,
    /// Accelerator-optimized A3 (H100)
    A3,
    /// Accelerator-optimized G2 (L4)
    G2,
    /// Anything else (E2, N2, C3, ...)
    Other,
}

impl MachineFamily {
    /// Classify a machine type such as `n1-standard-16`
    pub fn of(machine_type: &str) -> Self {
        let prefix = machine_type
            .split('-')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match prefix.as_str() {
            "n1" => MachineFamily::N1,
            "a2" => MachineFamily::A2,
            "a3" => MachineFamily::A3,
            "g2" => MachineFamily::G2,
            _ => MachineFamily::Other,
        }
    }

    /// Whether GPUs come with the machine type itself
    pub fn has_builtin_gpus(&self) -> bool {
        matches!(
            self,
            MachineFamily::A2 | MachineFamily::A3 | MachineFamily::G2
        )
    }

    /// Whether `accelerators` may be listed on the instance policy
    pub fn accepts_attached_gpus(&self) -> bool {
        matches!(self, MachineFamily::N1)
    }
}

impl std::fmt::Display for MachineFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineFamily::N1 => write!(f, "N1"),
            MachineFamily::A2 => write!(f, "A2"),
            MachineFamily::A3 => write!(f, "A3"),
            MachineFamily::G2 => write!(f, "G2"),
            MachineFamily::Other => write!(f, "other"),
        }
    }
}

/// Check the accelerators requested for a machine type
pub fn check_accelerators(machine_type: &str, accelerators: &[Accelerator]) -> BatchResult<()> {
    if accelerators.is_empty() {
        return Ok(());
    }

    let family = MachineFamily::of(machine_type);
    if family.has_builtin_gpus() {
        return Err(BatchError::Validation(format!(
            "machine type {} ({} family) comes with its GPUs; do not list accelerators",
            machine_type, family
        )));
    }
    if !family.accepts_attached_gpus() {
        return Err(BatchError::Validation(format!(
            "machine type {} ({} family) does not take attached accelerators",
            machine_type, family
        )));
    }

    for accelerator in accelerators {
        if accelerator.accelerator_type.is_empty() {
            return Err(BatchError::Validation(
                "accelerator type must not be empty".to_string(),
            ));
        }
        if accelerator.count == 0 {
            return Err(BatchError::Validation(format!(
                "accelerator {} requested with a count of 0",
                accelerator.accelerator_type
            )));
        }
    }

    Ok(())
}
