//! Job handlers
//!
//! A handler owns all domain-specific work for one job type. It reports a
//! result value rather than failing: any internal problem becomes
//! `HandlerOutcome::Error` so the dispatcher can apply the retry policy.
//!
//! Handlers are registered by job type at startup. Looking up a type with
//! no registered handler yields `Resolution::Unsupported`.

mod compress_video;
mod test_job;

pub use compress_video::CompressVideoHandler;
pub use test_job::TestJobHandler;

use async_trait::async_trait;
use cluster_core::domain::job::{Job, JobOutcome};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;

/// Result reported by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Success,
    Error { detail: String },
}

impl HandlerOutcome {
    pub fn error(detail: impl Into<String>) -> Self {
        HandlerOutcome::Error {
            detail: detail.into(),
        }
    }
}

impl From<HandlerOutcome> for JobOutcome {
    fn from(outcome: HandlerOutcome) -> Self {
        match outcome {
            HandlerOutcome::Success => JobOutcome::Success,
            HandlerOutcome::Error { detail } => JobOutcome::Error { detail },
        }
    }
}

/// Trait for job handlers
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs the job with the worker's static configuration
    async fn handle(&self, job: &Job, config: &Config) -> HandlerOutcome;
}

/// Outcome of looking up a handler
pub enum Resolution {
    Handler(Arc<dyn JobHandler>),
    Unsupported,
}

/// Registry of job handlers by job type
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in handler registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(TestJobHandler::JOB_TYPE, TestJobHandler);
        registry.register(CompressVideoHandler::JOB_TYPE, CompressVideoHandler);
        registry
    }

    /// Registers a handler, replacing any previous one for the same type
    pub fn register<H: JobHandler + 'static>(&mut self, job_type: impl Into<String>, handler: H) {
        self.handlers.insert(job_type.into(), Arc::new(handler));
    }

    pub fn resolve(&self, job_type: &str) -> Resolution {
        match self.handlers.get(job_type) {
            Some(handler) => Resolution::Handler(Arc::clone(handler)),
            None => Resolution::Unsupported,
        }
    }

    /// All registered job types, sorted
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
