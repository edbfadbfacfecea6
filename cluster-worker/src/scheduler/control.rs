//! Control listener
//!
//! Consumes commands from this worker's control channel and flips the ready
//! flag. Runs for the lifetime of the process; unknown commands are logged
//! and otherwise ignored.

use anyhow::Result;
use cluster_client::ClientError;
use cluster_core::domain::control::ControlCommand;
use cluster_core::keys::control_channel;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::scheduler::ready::ReadySwitch;

/// Applies remote pause/resume commands to the ready flag
pub struct ControlListener {
    worker_name: String,
    switch: ReadySwitch,
}

impl ControlListener {
    pub fn new(worker_name: impl Into<String>, switch: ReadySwitch) -> Self {
        Self {
            worker_name: worker_name.into(),
            switch,
        }
    }

    /// Applies one raw payload, returning the command it matched
    pub fn apply(&self, payload: &str) -> Option<ControlCommand> {
        let Some(command) = ControlCommand::parse(payload) else {
            info!(
                "[{}] Unknown command: {}",
                self.worker_name,
                payload.trim().to_lowercase()
            );
            return None;
        };

        match command {
            ControlCommand::Pause => {
                if self.switch.pause() {
                    info!("[{}] Pausing work.", self.worker_name);
                } else {
                    info!("[{}] Already paused.", self.worker_name);
                }
            }
            ControlCommand::Resume => {
                if self.switch.resume() {
                    info!("[{}] Resuming work.", self.worker_name);
                } else {
                    info!("[{}] Already running.", self.worker_name);
                }
            }
        }

        Some(command)
    }

    /// Runs until shutdown or until the subscription ends
    ///
    /// A dropped subscription is returned as an error; the ready flag keeps
    /// whatever value it had and no resubscription is attempted.
    ///
    /// # Arguments
    /// * `commands` - Payloads from the subscribed control channel
    /// * `shutdown` - Cancelled when the process is shutting down
    pub async fn run(
        self,
        mut commands: mpsc::Receiver<String>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(
            "[{}] Listening on channel: {}",
            self.worker_name,
            control_channel(&self.worker_name)
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("[{}] Control listener stopped", self.worker_name);
                    return Ok(());
                }
                payload = commands.recv() => match payload {
                    Some(payload) => {
                        self.apply(&payload);
                    }
                    None => {
                        warn!(
                            "[{}] Control channel closed; pause/resume is unavailable",
                            self.worker_name
                        );
                        return Err(
                            ClientError::SubscriptionClosed(control_channel(&self.worker_name))
                                .into(),
                        );
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ready::ready_flag;

    #[test]
    fn test_apply_normalizes_commands() {
        let (switch, gate) = ready_flag(true);
        let listener = ControlListener::new("node-a", switch);

        assert_eq!(listener.apply("  PAUSE \n"), Some(ControlCommand::Pause));
        assert!(!gate.is_ready());

        assert_eq!(listener.apply("Resume"), Some(ControlCommand::Resume));
        assert!(gate.is_ready());
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        let (switch, gate) = ready_flag(true);
        let listener = ControlListener::new("node-a", switch);

        assert_eq!(listener.apply("restart"), None);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_pause_then_resume_transitions() {
        let (switch, mut gate) = ready_flag(true);
        let (tx, rx) = mpsc::channel(8);
        let listener = ControlListener::new("node-a", switch);
        let handle = tokio::spawn(listener.run(rx, CancellationToken::new()));

        tx.send("pause".to_string()).await.unwrap();
        assert!(!gate.changed().await);

        tx.send("bogus".to_string()).await.unwrap();
        tx.send("resume".to_string()).await.unwrap();
        assert!(gate.changed().await);

        drop(tx);
        let result = handle.await.unwrap();
        assert!(result.is_err());
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_shutdown_stops_listener() {
        let (switch, _gate) = ready_flag(true);
        let (_tx, rx) = mpsc::channel::<String>(1);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(ControlListener::new("node-a", switch).run(rx, shutdown.clone()));
        shutdown.cancel();

        assert!(handle.await.unwrap().is_ok());
    }
}
