//! Capability domain model
//!
//! A capability declares that a worker is willing to run one job type, and
//! how much resource headroom it needs before accepting one.

use serde::{Deserialize, Serialize};

/// CPU ceiling used when a capability omits `cpu_threshold`
pub const DEFAULT_CPU_THRESHOLD: f32 = 25.0;

/// Free-memory floor used when a capability omits `min_memory_mb`
pub const DEFAULT_MIN_MEMORY_MB: u64 = 1000;

/// One supported job type and its admission thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Job type this entry applies to (e.g. "compress-video")
    pub name: String,

    /// Reject when CPU usage is above this percentage
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f32,

    /// Reject when less than this much memory is available
    #[serde(default = "default_min_memory_mb")]
    pub min_memory_mb: u64,
}

fn default_cpu_threshold() -> f32 {
    DEFAULT_CPU_THRESHOLD
}

fn default_min_memory_mb() -> u64 {
    DEFAULT_MIN_MEMORY_MB
}

impl Capability {
    /// Creates a capability with the default thresholds
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
            min_memory_mb: DEFAULT_MIN_MEMORY_MB,
        }
    }

    pub fn with_cpu_threshold(mut self, cpu_threshold: f32) -> Self {
        self.cpu_threshold = cpu_threshold;
        self
    }

    pub fn with_min_memory_mb(mut self, min_memory_mb: u64) -> Self {
        self.min_memory_mb = min_memory_mb;
        self
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (cpu <= {}%, mem >= {}MB)",
            self.name, self.cpu_threshold, self.min_memory_mb
        )
    }
}

/// Finds the capability entry for a job type
pub fn find<'a>(capabilities: &'a [Capability], job_type: &str) -> Option<&'a Capability> {
    capabilities.iter().find(|c| c.name == job_type)
}
