//! Names of the per-worker keys and channels in shared state

/// Hash key holding a worker's heartbeat record
pub fn heartbeat_key(worker_name: &str) -> String {
    format!("heartbeat:{}", worker_name)
}

/// Pub/sub channel a worker listens on for control commands
pub fn control_channel(worker_name: &str) -> String {
    format!("worker_control:{}", worker_name)
}
