//! Heartbeat publisher
//!
//! While a job runs, a background task rewrites the worker's heartbeat
//! record every interval. The task is scoped to the job: the dispatcher
//! starts it after parsing a job and stops it (awaiting the task) before
//! deleting the record, so no write can land after the delete.

use chrono::Utc;
use chrono_tz::Tz;
use cluster_core::domain::heartbeat::HeartbeatRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::repository::HeartbeatStore;

/// Starts per-job heartbeat tasks
#[derive(Clone)]
pub struct HeartbeatPublisher {
    store: Arc<dyn HeartbeatStore>,
    worker_name: String,
    interval: Duration,
    timezone: Tz,
}

impl HeartbeatPublisher {
    /// Creates a new publisher
    ///
    /// # Arguments
    /// * `store` - Where heartbeat records are written
    /// * `worker_name` - Identity the record is keyed by
    /// * `interval` - Time between writes
    /// * `timezone` - Timezone of the `updated_at` timestamp
    pub fn new(
        store: Arc<dyn HeartbeatStore>,
        worker_name: impl Into<String>,
        interval: Duration,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            worker_name: worker_name.into(),
            interval,
            timezone,
        }
    }

    /// Spawns the heartbeat task for one job
    ///
    /// The first record is written as soon as the task runs, then once per
    /// interval until the returned handle is stopped.
    pub fn start(&self, job_id: impl Into<String>) -> HeartbeatHandle {
        let cancel = CancellationToken::new();
        let beats = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(Self::beat(
            self.clone(),
            job_id.into(),
            cancel.clone(),
            Arc::clone(&beats),
        ));

        HeartbeatHandle {
            cancel,
            task,
            beats,
        }
    }

    async fn beat(self, job_id: String, cancel: CancellationToken, beats: Arc<AtomicU64>) {
        loop {
            let now = Utc::now().with_timezone(&self.timezone).fixed_offset();
            let record = HeartbeatRecord::new(job_id.clone(), now);

            match self.store.write(&self.worker_name, &record).await {
                Ok(()) => {
                    beats.fetch_add(1, Ordering::SeqCst);
                    info!("[{}] in progress at {}", job_id, now.to_rfc3339());
                }
                Err(e) => warn!("[{}] Failed to write heartbeat: {:#}", job_id, e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

/// Handle to a running heartbeat task
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    beats: Arc<AtomicU64>,
}

impl HeartbeatHandle {
    /// Number of records successfully written so far
    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }

    /// Signals the task to stop and waits until it has
    pub async fn stop(self) {
        self.cancel.cancel();

        if let Err(e) = self.task.await {
            warn!("Heartbeat task ended abnormally: {}", e);
        }
    }
}
