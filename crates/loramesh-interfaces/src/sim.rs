//! Simulated LoRa channel.
//!
//! Every frame transmitted by one attached radio is heard by every other
//! attached radio (or, once links are configured, only by its neighbors).
//! Each delivery is independently dropped with probability `loss` and
//! delayed by a uniform random latency in `[0, max_latency]`, so frames can
//! arrive out of order, via several relays, or not at all. A sender never
//! hears its own transmission.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use loramesh_core::NodeId;
use loramesh_core::constants::MAX_FRAME;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::error::RadioError;
use crate::shutdown::ShutdownToken;
use crate::traits::Radio;

/// Frames buffered per radio before deliveries wait.
const INBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct MediumConfig {
    /// Probability in `[0, 1]` that a given receiver misses a frame.
    pub loss: f64,
    /// Upper bound of the per-delivery latency.
    pub max_latency: Duration,
    /// Seed for loss and latency draws; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl MediumConfig {
    /// A medium that delivers every frame immediately.
    pub fn lossless() -> Self {
        Self {
            loss: 0.0,
            max_latency: Duration::ZERO,
            seed: None,
        }
    }

    fn validate(&self) -> Result<(), RadioError> {
        if !(0.0..=1.0).contains(&self.loss) {
            return Err(RadioError::Configuration(format!(
                "loss must be within [0, 1], got {}",
                self.loss
            )));
        }
        Ok(())
    }
}

impl Default for MediumConfig {
    fn default() -> Self {
        Self {
            loss: 0.1,
            max_latency: Duration::from_millis(100),
            seed: None,
        }
    }
}

/// Counters for what the medium did with transmitted frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediumStats {
    pub transmissions: u64,
    pub deliveries: u64,
    pub losses: u64,
}

struct Port {
    key: u64,
    id: NodeId,
    inbox: mpsc::Sender<Vec<u8>>,
}

struct Medium {
    config: MediumConfig,
    ports: Mutex<Vec<Port>>,
    /// `None` means every radio hears every other radio.
    links: Mutex<Option<HashSet<(NodeId, NodeId)>>>,
    rng: Mutex<StdRng>,
    next_key: AtomicU64,
    transmissions: AtomicU64,
    deliveries: AtomicU64,
    losses: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Medium {
    fn broadcast(&self, sender_key: u64, from: NodeId, frame: &[u8]) {
        self.transmissions.fetch_add(1, Ordering::Relaxed);
        let max_ms = self.config.max_latency.as_millis() as u64;

        let scheduled: Vec<(NodeId, mpsc::Sender<Vec<u8>>, Duration)> = {
            let ports = lock(&self.ports);
            let links = lock(&self.links);
            let mut rng = lock(&self.rng);
            ports
                .iter()
                .filter(|port| port.key != sender_key)
                .filter(|port| match links.as_ref() {
                    Some(links) => links.contains(&(from, port.id)),
                    None => true,
                })
                .filter_map(|port| {
                    if rng.gen_bool(self.config.loss) {
                        self.losses.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(from = %from, to = %port.id, "frame lost on medium");
                        return None;
                    }
                    let delay = Duration::from_millis(rng.gen_range(0..=max_ms));
                    Some((port.id, port.inbox.clone(), delay))
                })
                .collect()
        };

        for (to, inbox, delay) in scheduled {
            self.deliveries.fetch_add(1, Ordering::Relaxed);
            let mut frame = frame.to_vec();
            // Undelayed frames go straight into the inbox so they keep
            // transmission order.
            if delay.is_zero() {
                match inbox.try_send(frame) {
                    Ok(()) => continue,
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::trace!(to = %to, "receiver gone, frame discarded");
                        continue;
                    }
                    Err(mpsc::error::TrySendError::Full(returned)) => frame = returned,
                }
            }
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if inbox.send(frame).await.is_err() {
                    tracing::trace!(to = %to, "receiver gone, frame discarded");
                }
            });
        }
    }

    fn detach(&self, key: u64) {
        lock(&self.ports).retain(|port| port.key != key);
    }
}

/// A shared broadcast medium. Cheap to clone.
#[derive(Clone)]
pub struct SimMedium {
    inner: Arc<Medium>,
}

impl SimMedium {
    pub fn new(config: MediumConfig) -> Result<Self, RadioError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            inner: Arc::new(Medium {
                config,
                ports: Mutex::new(Vec::new()),
                links: Mutex::new(None),
                rng: Mutex::new(rng),
                next_key: AtomicU64::new(0),
                transmissions: AtomicU64::new(0),
                deliveries: AtomicU64::new(0),
                losses: AtomicU64::new(0),
            }),
        })
    }

    /// Attach a new radio for node `id`.
    pub fn attach(&self, id: NodeId) -> SimRadio {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.ports).push(Port { key, id, inbox: tx });
        tracing::debug!(node = %id, "radio attached to simulated medium");

        SimRadio {
            name: format!("sim[{id}]"),
            id,
            key,
            medium: Arc::clone(&self.inner),
            inbox: tokio::sync::Mutex::new(rx),
            shutdown: ShutdownToken::new(),
        }
    }

    /// Let `a` and `b` hear each other.
    ///
    /// The first call switches the medium from "everyone hears everyone"
    /// to explicit neighbor links.
    pub fn link(&self, a: NodeId, b: NodeId) {
        let mut links = lock(&self.inner.links);
        let links = links.get_or_insert_with(HashSet::new);
        links.insert((a, b));
        links.insert((b, a));
    }

    pub fn config(&self) -> &MediumConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> MediumStats {
        MediumStats {
            transmissions: self.inner.transmissions.load(Ordering::Relaxed),
            deliveries: self.inner.deliveries.load(Ordering::Relaxed),
            losses: self.inner.losses.load(Ordering::Relaxed),
        }
    }
}

/// One node's radio on a [`SimMedium`].
pub struct SimRadio {
    name: String,
    id: NodeId,
    key: u64,
    medium: Arc<Medium>,
    inbox: tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>,
    shutdown: ShutdownToken,
}

impl SimRadio {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Radio for SimRadio {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_online(&self) -> bool {
        !self.shutdown.is_stopped()
    }

    async fn transmit(&self, frame: &[u8]) -> Result<(), RadioError> {
        if self.shutdown.is_stopped() {
            return Err(RadioError::Stopped);
        }
        if frame.len() > MAX_FRAME {
            return Err(RadioError::FrameTooLarge {
                size: frame.len(),
                max: MAX_FRAME,
            });
        }
        self.medium.broadcast(self.key, self.id, frame);
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<u8>, RadioError> {
        let mut stop_rx = self.shutdown.subscribe();
        if *stop_rx.borrow() {
            return Err(RadioError::Stopped);
        }
        let mut inbox = self.inbox.lock().await;
        tokio::select! {
            frame = inbox.recv() => frame.ok_or(RadioError::Stopped),
            _ = stop_rx.changed() => Err(RadioError::Stopped),
        }
    }

    async fn stop(&self) -> Result<(), RadioError> {
        self.shutdown.signal_stop();
        self.medium.detach(self.key);
        Ok(())
    }
}

impl Drop for SimRadio {
    fn drop(&mut self) {
        self.medium.detach(self.key);
    }
}
