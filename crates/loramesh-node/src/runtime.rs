//! Background receive loop and its handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use loramesh_core::Packet;
use loramesh_interfaces::{Radio, RadioError, ShutdownToken};
use tokio::sync::watch;

use crate::error::NodeError;
use crate::node::Node;

/// Owns a running node's receive task.
///
/// Dropping the handle without calling [`stop`](Self::stop) ends the
/// receive loop but leaves the radio online.
pub struct NodeHandle<R: Radio> {
    node: Arc<Node<R>>,
    shutdown: ShutdownToken,
    stopped: AtomicBool,
}

impl<R: Radio + 'static> Node<R> {
    /// Start the receive loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`NodeError::AlreadyRunning`] if the node was already spawned.
    pub async fn spawn(self: Arc<Self>) -> Result<NodeHandle<R>, NodeError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(NodeError::AlreadyRunning);
        }

        let shutdown = ShutdownToken::new();
        let stop_rx = shutdown.subscribe();
        let task = tokio::spawn(receive_loop(Arc::clone(&self), stop_rx));
        shutdown.track(task).await;

        tracing::info!(node = %self.id(), radio = self.radio().name(), "node started");
        Ok(NodeHandle {
            node: self,
            shutdown,
            stopped: AtomicBool::new(false),
        })
    }
}

impl<R: Radio + 'static> NodeHandle<R> {
    pub fn node(&self) -> &Arc<Node<R>> {
        &self.node
    }

    /// Interrupt the receive loop, wait for it to exit and take the radio
    /// offline.
    ///
    /// # Errors
    ///
    /// [`NodeError::NotRunning`] on a second call, or the radio's error if
    /// it failed to stop.
    pub async fn stop(&self) -> Result<(), NodeError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(NodeError::NotRunning);
        }
        self.shutdown.stop_and_join().await;
        let result = self.node.radio().stop().await;
        self.node.running.store(false, Ordering::Release);
        tracing::info!(node = %self.node.id(), "node stopped");
        result.map_err(NodeError::from)
    }
}

async fn receive_loop<R: Radio>(node: Arc<Node<R>>, mut stop_rx: watch::Receiver<bool>) {
    let id = node.id();
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            result = node.radio().receive() => match result {
                Ok(frame) => match Packet::parse(&frame) {
                    Ok(packet) => {
                        let outcome = node.handle(packet).await;
                        tracing::trace!(node = %id, ?outcome, "frame handled");
                    }
                    Err(e) => tracing::debug!(node = %id, len = frame.len(), "frame parse failed: {e}"),
                },
                Err(RadioError::Stopped) => {
                    tracing::debug!(node = %id, "radio stopped, receive loop exiting");
                    break;
                }
                Err(e) => tracing::warn!(node = %id, error = %e, "receive failed"),
            },
        }
    }
}
