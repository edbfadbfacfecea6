//! Ready flag
//!
//! A single boolean shared between the control listener (the only writer)
//! and the dispatcher (the only reader, which waits on it before each
//! dequeue). Backed by a watch channel so waiting needs no polling.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Creates a connected switch/gate pair
pub fn ready_flag(ready: bool) -> (ReadySwitch, ReadyGate) {
    let (tx, rx) = watch::channel(ready);
    (ReadySwitch { tx: Arc::new(tx) }, ReadyGate { rx })
}

/// Write side of the ready flag
#[derive(Clone)]
pub struct ReadySwitch {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySwitch {
    /// Clears the flag; returns whether it was set before
    pub fn pause(&self) -> bool {
        self.set(false)
    }

    /// Sets the flag; returns whether it was clear before
    pub fn resume(&self) -> bool {
        self.set(true)
    }

    fn set(&self, ready: bool) -> bool {
        self.tx.send_if_modified(|current| {
            let changed = *current != ready;
            *current = ready;
            changed
        })
    }
}

/// Read side of the ready flag
#[derive(Clone)]
pub struct ReadyGate {
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the flag is set
    ///
    /// Returns immediately when it already is. If every switch has been
    /// dropped while paused, the worker stays paused for good.
    pub async fn wait_ready(&mut self) {
        if self.rx.wait_for(|ready| *ready).await.is_err() {
            warn!("Ready flag has no writer left while paused");
            std::future::pending::<()>().await;
        }
    }

    /// Waits for the next change of the flag and returns its new value
    #[cfg(test)]
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.map(|_| *self.rx.borrow_and_update()).unwrap_or(false)
    }
}
