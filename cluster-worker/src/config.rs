//! Worker configuration
//!
//! Defines all configurable parameters for the worker: its identity in the
//! cluster, broker connection settings, the capability list used for
//! admission, and the timings of the job lifecycle.
//!
//! Configuration is read once at startup from a YAML file and treated as
//! immutable afterwards.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use cluster_core::domain::capability::Capability;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location of the config file relative to the user's home directory
const DEFAULT_CONFIG_PATH: &str = ".config/Cluster-Worker/cluster-config.yaml";

/// Worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Unique name of this worker in the cluster
    pub worker_name: String,

    /// Root that job input/output paths are resolved against
    pub shared_root: PathBuf,

    /// Broker host
    pub redis_host: String,

    /// Broker port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Name of the shared job queue
    #[serde(default = "default_redis_queue")]
    pub redis_queue: String,

    /// File that log output is mirrored to
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Job types this worker accepts, with their resource thresholds
    #[serde(default)]
    pub capabilities: Vec<Capability>,

    /// Seconds between heartbeat writes while a job runs
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Seconds to wait after re-queuing a job that failed admission
    #[serde(default = "default_reject_backoff_secs")]
    pub reject_backoff_secs: u64,

    /// Retries allowed for a job whose handler reports an error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Window over which CPU usage is measured for admission
    #[serde(default = "default_cpu_sample_window_ms")]
    pub cpu_sample_window_ms: u64,

    /// Timezone heartbeat timestamps are written in
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// Encoder binary used by the compress-video handler
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_queue() -> String {
    "tasks".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/mnt/cluster/cluster.log")
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_reject_backoff_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_cpu_sample_window_ms() -> u64 {
    1000
}

fn default_timezone() -> Tz {
    chrono_tz::America::New_York
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Config {
    /// Creates a new configuration with defaults for everything optional
    #[allow(dead_code)]
    pub fn new(
        worker_name: impl Into<String>,
        shared_root: impl Into<PathBuf>,
        redis_host: impl Into<String>,
    ) -> Self {
        Self {
            worker_name: worker_name.into(),
            shared_root: shared_root.into(),
            redis_host: redis_host.into(),
            redis_port: default_redis_port(),
            redis_queue: default_redis_queue(),
            log_file: default_log_file(),
            capabilities: Vec::new(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            reject_backoff_secs: default_reject_backoff_secs(),
            max_retries: default_max_retries(),
            cpu_sample_window_ms: default_cpu_sample_window_ms(),
            timezone: default_timezone(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }

    /// Default config file location (`~/.config/Cluster-Worker/cluster-config.yaml`)
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(Path::new(&home).join(DEFAULT_CONFIG_PATH))
    }

    /// Parses configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse worker configuration")
    }

    /// Reads configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    /// Applies overrides from the process environment
    ///
    /// Recognized variables:
    /// - WORKER_NAME
    /// - REDIS_HOST
    /// - REDIS_PORT
    /// - REDIS_QUEUE
    /// - LOG_FILE
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(name) = lookup("WORKER_NAME") {
            self.worker_name = name;
        }

        if let Some(host) = lookup("REDIS_HOST") {
            self.redis_host = host;
        }

        if let Some(port) = lookup("REDIS_PORT") {
            self.redis_port = port
                .parse()
                .with_context(|| format!("REDIS_PORT is not a valid port: {}", port))?;
        }

        if let Some(queue) = lookup("REDIS_QUEUE") {
            self.redis_queue = queue;
        }

        if let Some(log_file) = lookup("LOG_FILE") {
            self.log_file = PathBuf::from(log_file);
        }

        Ok(self)
    }

    /// Adds a capability
    #[allow(dead_code)]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn reject_backoff(&self) -> Duration {
        Duration::from_secs(self.reject_backoff_secs)
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms)
    }

    /// Resolves a job path against the shared root
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        self.shared_root.join(relative)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.worker_name.trim().is_empty() {
            anyhow::bail!("worker_name cannot be empty");
        }

        if self.redis_host.trim().is_empty() {
            anyhow::bail!("redis_host cannot be empty");
        }

        if self.redis_queue.trim().is_empty() {
            anyhow::bail!("redis_queue cannot be empty");
        }

        if self.heartbeat_interval_secs == 0 {
            anyhow::bail!("heartbeat_interval_secs must be greater than 0");
        }

        if self.cpu_sample_window_ms < 1000 {
            anyhow::bail!("cpu_sample_window_ms must be at least 1000");
        }

        let mut seen = HashSet::new();
        for capability in &self.capabilities {
            if !seen.insert(capability.name.as_str()) {
                anyhow::bail!("duplicate capability: {}", capability.name);
            }

            if !(0.0..=100.0).contains(&capability.cpu_threshold) {
                anyhow::bail!(
                    "cpu_threshold for {} must be between 0 and 100",
                    capability.name
                );
            }
        }

        Ok(())
    }
}
