//! Capability matcher
//!
//! Decides whether this worker should take a job right now: the job type
//! must be in the configured capability list, and the local machine must
//! have the headroom that capability asks for.

use async_trait::async_trait;
use cluster_core::domain::capability::{self, Capability};
use std::sync::Arc;

use crate::service::resources::{ResourceMonitor, ResourceSample};

/// Result of an admission check
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// The job may run
    Accepted,

    /// No capability is declared for this job type
    NoCapability { job_type: Option<String> },

    /// CPU usage is above the capability's threshold
    CpuBusy { current: f32, limit: f32 },

    /// Available memory is below the capability's floor
    LowMemory { available_mb: f64, required_mb: u64 },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }

    /// Checks a resource sample against one capability
    pub fn check(capability: &Capability, sample: ResourceSample) -> Self {
        if sample.cpu_percent > capability.cpu_threshold {
            return Admission::CpuBusy {
                current: sample.cpu_percent,
                limit: capability.cpu_threshold,
            };
        }

        if sample.available_mem_mb < capability.min_memory_mb as f64 {
            return Admission::LowMemory {
                available_mb: sample.available_mem_mb,
                required_mb: capability.min_memory_mb,
            };
        }

        Admission::Accepted
    }
}

impl std::fmt::Display for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Admission::Accepted => write!(f, "Accepted"),
            Admission::NoCapability { job_type } => write!(
                f,
                "No capability found for job type '{}'",
                job_type.as_deref().unwrap_or("<none>")
            ),
            Admission::CpuBusy { current, limit } => {
                write!(f, "Skipping: CPU usage {:.1}% > limit {}%", current, limit)
            }
            Admission::LowMemory {
                available_mb,
                required_mb,
            } => write!(
                f,
                "Skipping: Memory available {}MB < required {}MB",
                *available_mb as u64, required_mb
            ),
        }
    }
}

/// Service trait for admission control
#[async_trait]
pub trait CapabilityMatcher: Send + Sync {
    /// Evaluates whether a job of this type may run now
    ///
    /// Rejections carry the reason so the caller can log it.
    async fn evaluate(&self, job_type: Option<&str>) -> Admission;
}

/// Standard implementation of CapabilityMatcher
///
/// Looks the job type up in a fixed capability list and takes a single
/// resource sample only when a matching capability exists.
pub struct StandardCapabilityMatcher {
    capabilities: Vec<Capability>,
    monitor: Arc<dyn ResourceMonitor>,
}

impl StandardCapabilityMatcher {
    /// Creates a new matcher
    ///
    /// # Arguments
    /// * `capabilities` - Job types this worker accepts
    /// * `monitor` - Source of resource samples
    pub fn new(capabilities: Vec<Capability>, monitor: Arc<dyn ResourceMonitor>) -> Self {
        Self {
            capabilities,
            monitor,
        }
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }
}

#[async_trait]
impl CapabilityMatcher for StandardCapabilityMatcher {
    async fn evaluate(&self, job_type: Option<&str>) -> Admission {
        let Some(capability) = job_type.and_then(|t| capability::find(&self.capabilities, t))
        else {
            return Admission::NoCapability {
                job_type: job_type.map(str::to_string),
            };
        };

        let sample = self.monitor.sample().await;
        Admission::check(capability, sample)
    }
}
