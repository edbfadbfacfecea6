//! Heartbeat repository
//!
//! Writes and deletes the liveness record kept under `heartbeat:<worker>`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cluster_client::BrokerClient;
use cluster_core::domain::heartbeat::HeartbeatRecord;
use cluster_core::keys::heartbeat_key;

/// Repository trait for heartbeat records
#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    /// Writes the heartbeat record for a worker, replacing any previous one
    async fn write(&self, worker_name: &str, record: &HeartbeatRecord) -> Result<()>;

    /// Deletes the heartbeat record for a worker
    async fn clear(&self, worker_name: &str) -> Result<()>;
}

/// Redis implementation of HeartbeatStore
pub struct RedisHeartbeatStore {
    client: BrokerClient,
}

impl RedisHeartbeatStore {
    pub fn new(client: BrokerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HeartbeatStore for RedisHeartbeatStore {
    async fn write(&self, worker_name: &str, record: &HeartbeatRecord) -> Result<()> {
        self.client
            .write_heartbeat(&heartbeat_key(worker_name), record)
            .await
            .context("Failed to write heartbeat")
    }

    async fn clear(&self, worker_name: &str) -> Result<()> {
        self.client
            .delete_heartbeat(&heartbeat_key(worker_name))
            .await
            .context("Failed to delete heartbeat")
    }
}
