//! Job domain types

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Id reported for jobs whose message carries no `id` field
pub const UNKNOWN_JOB_ID: &str = "UNKNOWN";

const ID_FIELD: &str = "id";
const TYPE_FIELD: &str = "job_type";
const RETRIES_FIELD: &str = "retries";

/// A unit of work pulled from the shared queue
///
/// Only `id`, `job_type` and `retries` are interpreted by the worker. The
/// message is kept as an ordered field map with numbers in their original
/// text, so a re-queued job differs from the original only in `retries`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Job {
    fields: Map<String, Value>,
}

/// Error raised when a queue message is not a job object
#[derive(Debug, Error)]
pub enum JobParseError {
    #[error("malformed job message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed job message: invalid '{field}' value {value}")]
    InvalidField { field: &'static str, value: Value },
}

impl Job {
    /// Creates a job with the given id and type and no payload
    pub fn new(id: impl Into<String>, job_type: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        fields.insert(TYPE_FIELD.to_string(), Value::String(job_type.into()));
        Self { fields }
    }

    /// Parses a raw queue message
    ///
    /// The message must be a UTF-8 JSON object. `id`, `job_type` and
    /// `retries` are all optional, but when present `job_type` must be a
    /// string and `retries` a non-negative integer.
    pub fn from_message(message: impl AsRef<[u8]>) -> Result<Self, JobParseError> {
        let fields: Map<String, Value> = serde_json::from_slice(message.as_ref())?;

        match fields.get(TYPE_FIELD) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(other) => {
                return Err(JobParseError::InvalidField {
                    field: TYPE_FIELD,
                    value: other.clone(),
                });
            }
        }

        match fields.get(RETRIES_FIELD) {
            None | Some(Value::Null) => {}
            Some(value) if as_retries(value).is_some() => {}
            Some(other) => {
                return Err(JobParseError::InvalidField {
                    field: RETRIES_FIELD,
                    value: other.clone(),
                });
            }
        }

        Ok(Self { fields })
    }

    /// Serializes the job back into a single-line queue message
    pub fn to_message(&self) -> Result<String, JobParseError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The job id as displayed in logs and heartbeat records
    ///
    /// Non-string ids (e.g. numbers) are rendered as JSON.
    pub fn id(&self) -> String {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            None | Some(Value::Null) => UNKNOWN_JOB_ID.to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn job_type(&self) -> Option<&str> {
        self.fields.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// Number of retries already spent on this job
    pub fn retries(&self) -> u32 {
        self.fields
            .get(RETRIES_FIELD)
            .and_then(as_retries)
            .unwrap_or(0)
    }

    /// Returns a copy with the retry counter bumped by one
    ///
    /// An existing `retries` field keeps its position; otherwise the
    /// counter is appended after the other fields.
    pub fn with_next_retry(&self) -> Self {
        let mut next = self.clone();
        next.fields
            .insert(RETRIES_FIELD.to_string(), Value::from(self.retries() + 1));
        next
    }

    /// Looks up a string field from the handler payload
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Builder-style helper to attach a payload field
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }
}

fn as_retries(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

/// Final outcome of dispatching one job to its handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The handler completed the job
    Success,

    /// The handler reported a failure; eligible for retry
    Error { detail: String },

    /// No handler is registered for the job type; never retried
    Unsupported,
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Success => write!(f, "success"),
            JobOutcome::Error { detail } => write!(f, "error ({})", detail),
            JobOutcome::Unsupported => write!(f, "unsupported"),
        }
    }
}
