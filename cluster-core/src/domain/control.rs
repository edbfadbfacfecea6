//! Remote control commands
//!
//! Commands published on a worker's control channel. Payloads are matched
//! case-insensitively after trimming whitespace.

use std::str::FromStr;

/// A recognized control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Stop dequeuing new jobs
    Pause,

    /// Resume dequeuing jobs
    Resume,
}

impl ControlCommand {
    /// Parses a raw channel payload, returning `None` for unknown commands
    pub fn parse(payload: &str) -> Option<Self> {
        payload.parse().ok()
    }
}

impl FromStr for ControlCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pause" => Ok(ControlCommand::Pause),
            "resume" => Ok(ControlCommand::Resume),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlCommand::Pause => write!(f, "pause"),
            ControlCommand::Resume => write!(f, "resume"),
        }
    }
}
