//! Control channel subscription

use crate::BrokerClient;
use crate::error::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Capacity of the buffer between the pub/sub connection and its consumer
const CONTROL_BUFFER: usize = 32;

impl BrokerClient {
    // =============================================================================
    // Control Channel
    // =============================================================================

    /// Subscribe to a pub/sub channel
    ///
    /// Opens a dedicated connection and forwards every data message payload
    /// into the returned receiver. Subscription confirmations are not
    /// forwarded. The receiver yields `None` once the connection drops; no
    /// resubscription is attempted.
    ///
    /// # Arguments
    /// * `channel` - Channel name, usually `worker_control:<worker>`
    pub async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(CONTROL_BUFFER);
        let channel = channel.to_string();

        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();

            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Dropping undecodable message on {}: {}", channel, e);
                        continue;
                    }
                };

                if tx.send(payload).await.is_err() {
                    debug!("Control receiver for {} dropped", channel);
                    return;
                }
            }

            warn!("Subscription to {} ended", channel);
        });

        Ok(rx)
    }
}
