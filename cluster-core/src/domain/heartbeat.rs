//! Heartbeat domain model
//!
//! Liveness record a worker keeps in shared state while it runs a job.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Liveness record stored under `heartbeat:<worker>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    /// Job currently being processed
    pub job_id: String,

    /// When this record was last written
    pub updated_at: DateTime<FixedOffset>,
}

impl HeartbeatRecord {
    pub fn new(job_id: impl Into<String>, updated_at: DateTime<FixedOffset>) -> Self {
        Self {
            job_id: job_id.into(),
            updated_at,
        }
    }

    /// Field/value pairs as written to the hash in shared state
    ///
    /// `updated_at` is rendered as ISO-8601 with its offset preserved.
    pub fn fields(&self) -> [(&'static str, String); 2] {
        [
            ("job_id", self.job_id.clone()),
            ("updated_at", self.updated_at.to_rfc3339()),
        ]
    }
}
