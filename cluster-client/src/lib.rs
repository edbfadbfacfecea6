//! Cluster Broker Client
//!
//! A small, typed client for the shared Redis instance a cluster of workers
//! coordinates through.
//!
//! It covers the three interfaces a worker touches:
//! - The job queue (blocking pop, tail push)
//! - The heartbeat hash keyed by worker name
//! - The per-worker control channel (pub/sub)
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::BrokerClient;
//!
//! #[tokio::main]
//! async fn main() -> cluster_client::Result<()> {
//!     let client = BrokerClient::connect("localhost", 6379).await?;
//!
//!     client.push("tasks", br#"{"id":"1","job_type":"job-test"}"#).await?;
//!     let message = client.pop_blocking("tasks").await?;
//!
//!     println!("Popped: {}", String::from_utf8_lossy(&message));
//!     Ok(())
//! }
//! ```

pub mod error;
mod control;
mod heartbeats;
mod queue;

pub use error::{ClientError, Result};

use redis::Client;
use redis::aio::ConnectionManager;
use tracing::debug;

/// Builds a Redis connection URL from host and port (database 0)
pub fn redis_url(host: &str, port: u16) -> String {
    format!("redis://{}:{}/0", host, port)
}

/// Client for the shared broker
///
/// Holds two connections: one reserved for blocking queue pops and one for
/// every other command, so a pop that waits indefinitely never delays a
/// heartbeat write. Both reconnect on their own after the broker drops
/// them; the command that saw the drop still fails.
#[derive(Clone)]
pub struct BrokerClient {
    /// Connection URL (e.g., "redis://localhost:6379/0")
    url: String,
    /// Redis client, used to open pub/sub connections
    client: Client,
    /// Connection used for BLPOP only
    blocking: ConnectionManager,
    /// Connection used for all non-blocking commands
    commands: ConnectionManager,
}

impl BrokerClient {
    /// Connect to the broker at `host:port`
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_url(redis_url(host, port)).await
    }

    /// Connect to the broker at a full Redis URL
    pub async fn connect_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = Client::open(url.as_str())?;

        let blocking = client.get_connection_manager().await?;
        let commands = client.get_connection_manager().await?;

        debug!("Connected to broker at {}", url);

        Ok(Self {
            url,
            client,
            blocking,
            commands,
        })
    }

    /// Get the URL this client is connected to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient").field("url", &self.url).finish()
    }
}
