//! Job queue operations

use crate::BrokerClient;
use crate::error::Result;
use redis::AsyncCommands;

impl BrokerClient {
    // =============================================================================
    // Queue
    // =============================================================================

    /// Pop the next message from the head of a queue
    ///
    /// Blocks until a message is available; there is no timeout. The
    /// message is returned as raw bytes, undecoded.
    ///
    /// # Arguments
    /// * `queue` - Name of the list used as the queue
    pub async fn pop_blocking(&self, queue: &str) -> Result<Vec<u8>> {
        let mut conn = self.blocking.clone();

        loop {
            // BLPOP with timeout 0 waits forever and replies [queue, message]
            let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
                .arg(queue)
                .arg(0)
                .query_async(&mut conn)
                .await?;

            if let Some((_, message)) = popped {
                return Ok(message);
            }
        }
    }

    /// Append a message to the tail of a queue
    ///
    /// # Arguments
    /// * `queue` - Name of the list used as the queue
    /// * `message` - Serialized job, pushed verbatim
    pub async fn push(&self, queue: &str, message: &[u8]) -> Result<()> {
        let mut conn = self.commands.clone();
        let _: () = conn.rpush(queue, message).await?;
        Ok(())
    }
}
