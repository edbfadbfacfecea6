//! Retry policy
//!
//! Decides what happens to a job whose handler reported an error. The
//! decision depends only on the job's own retry counter.

use cluster_core::domain::job::Job;

/// What to do with a failed job
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Push this job (counter already bumped) onto the tail of the queue
    Requeue(Job),

    /// Drop the job; all retries are spent
    GiveUp { retries: u32 },
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn decide(&self, job: &Job) -> RetryDecision {
        let retries = job.retries();
        if retries < self.max_retries {
            RetryDecision::Requeue(job.with_next_retry())
        } else {
            RetryDecision::GiveUp { retries }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}
