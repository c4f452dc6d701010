//! Stop signal shared between an owner and its background tasks.
//!
//! [`ShutdownToken`] pairs a `watch` channel with the `JoinHandle`s of the
//! tasks listening on it, so a stop is one call that both wakes every
//! blocked task and waits for them to finish.

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

pub struct ShutdownToken {
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            stop_tx,
            stop_rx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// A receiver for use in a `tokio::select!` branch.
    ///
    /// The receiver has not observed any value yet, so `changed()` resolves
    /// immediately if the stop signal was sent before subscribing.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Resolve once the stop signal has been sent.
    pub async fn stopped(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this only returns on stop.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Register a task to be joined on [`stop_and_join`](Self::stop_and_join).
    pub async fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().await.push(handle);
    }

    /// Send the stop signal. Idempotent.
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Signal stop and await every tracked task.
    ///
    /// Panicked or cancelled tasks are logged and otherwise ignored.
    pub async fn stop_and_join(&self) {
        self.signal_stop();
        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
    }

    pub async fn tracked(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
