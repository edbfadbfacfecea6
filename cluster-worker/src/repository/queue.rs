//! Job queue repository
//!
//! Handles the worker's side of the shared queue:
//! - Blocking pop of the next message
//! - Pushing messages back onto the tail (re-queue and retry)

use anyhow::{Context, Result};
use async_trait::async_trait;
use cluster_client::BrokerClient;

/// Repository trait for the shared job queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Pops the next raw message, waiting as long as it takes
    ///
    /// The bytes are returned undecoded; invalid UTF-8 is left for the job
    /// parser to reject.
    async fn pop(&self) -> Result<Vec<u8>>;

    /// Appends a raw message to the tail of the queue
    ///
    /// # Arguments
    /// * `message` - Serialized job, pushed verbatim
    async fn push(&self, message: &[u8]) -> Result<()>;
}

/// Redis implementation of JobQueue
pub struct RedisJobQueue {
    client: BrokerClient,
    queue: String,
}

impl RedisJobQueue {
    /// Creates a new Redis job queue
    ///
    /// # Arguments
    /// * `client` - Connected broker client
    /// * `queue` - Name of the list used as the queue
    pub fn new(client: BrokerClient, queue: impl Into<String>) -> Self {
        Self {
            client,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn pop(&self) -> Result<Vec<u8>> {
        self.client
            .pop_blocking(&self.queue)
            .await
            .with_context(|| format!("Failed to pop from queue {}", self.queue))
    }

    async fn push(&self, message: &[u8]) -> Result<()> {
        self.client
            .push(&self.queue, message)
            .await
            .with_context(|| format!("Failed to push to queue {}", self.queue))
    }
}
