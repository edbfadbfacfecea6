//! Heartbeat hash operations

use crate::BrokerClient;
use crate::error::Result;
use cluster_core::domain::heartbeat::HeartbeatRecord;
use redis::AsyncCommands;

impl BrokerClient {
    // =============================================================================
    // Heartbeats
    // =============================================================================

    /// Write (or overwrite) a heartbeat record
    ///
    /// # Arguments
    /// * `key` - Hash key, usually `heartbeat:<worker>`
    /// * `record` - Job id and timestamp to store
    pub async fn write_heartbeat(&self, key: &str, record: &HeartbeatRecord) -> Result<()> {
        let mut conn = self.commands.clone();
        let _: () = conn.hset_multiple(key, &record.fields()).await?;
        Ok(())
    }

    /// Delete a heartbeat record
    ///
    /// Deleting a key that does not exist is not an error.
    pub async fn delete_heartbeat(&self, key: &str) -> Result<()> {
        let mut conn = self.commands.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
