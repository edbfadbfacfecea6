//! Resource monitor
//!
//! Samples local CPU usage and available memory. CPU usage is measured over
//! a sampling window so a momentary spike does not flip admission decisions.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::System;

/// One reading of local resource usage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// Global CPU usage in percent (0-100)
    pub cpu_percent: f32,

    /// Currently available physical memory in megabytes
    pub available_mem_mb: f64,
}

/// Service trait for sampling local resources
#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    /// Takes one sample
    ///
    /// May wait for the length of the sampling window before returning.
    async fn sample(&self) -> ResourceSample;
}

/// sysinfo-backed implementation of ResourceMonitor
pub struct SystemResourceMonitor {
    system: Mutex<System>,
    window: Duration,
}

impl SystemResourceMonitor {
    /// Creates a monitor measuring CPU usage over `window`
    ///
    /// Windows shorter than the platform's minimum CPU refresh interval are
    /// raised to that minimum.
    pub fn new(window: Duration) -> Self {
        Self {
            system: Mutex::new(System::new()),
            window: window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> T {
        let mut system = self
            .system
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut system)
    }
}

#[async_trait]
impl ResourceMonitor for SystemResourceMonitor {
    async fn sample(&self) -> ResourceSample {
        self.with_system(|system| system.refresh_cpu_usage());

        tokio::time::sleep(self.window).await;

        self.with_system(|system| {
            system.refresh_cpu_usage();
            system.refresh_memory();

            ResourceSample {
                cpu_percent: system.global_cpu_usage(),
                available_mem_mb: system.available_memory() as f64 / 1024.0 / 1024.0,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_has_a_floor() {
        let monitor = SystemResourceMonitor::new(Duration::from_millis(1));
        assert!(monitor.window >= sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        let monitor = SystemResourceMonitor::new(Duration::from_secs(1));
        assert_eq!(monitor.window, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sample_is_in_range() {
        let monitor = SystemResourceMonitor::new(Duration::from_millis(250));
        let sample = monitor.sample().await;

        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!(sample.available_mem_mb >= 0.0);
    }
}
