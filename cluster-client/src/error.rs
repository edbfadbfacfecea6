//! Error types for the cluster client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the shared broker
#[derive(Debug, Error)]
pub enum ClientError {
    /// Redis command or connection failed
    #[error("Redis request failed: {0}")]
    Redis(#[from] redis::RedisError),

    /// The pub/sub subscription ended
    #[error("Subscription to {0} closed")]
    SubscriptionClosed(String),
}

impl ClientError {
    /// Check if this error means the broker connection itself is gone
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Redis(e) => e.is_connection_dropped() || e.is_connection_refusal() || e.is_io_error(),
            Self::SubscriptionClosed(_) => true,
        }
    }
}
