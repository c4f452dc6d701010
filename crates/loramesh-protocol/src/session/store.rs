//! Per-peer session bookkeeping.
//!
//! All per-peer state lives in one map behind one lock, and every public
//! operation is a single check-and-update under that lock. Nothing here
//! holds the lock across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use loramesh_core::NodeId;
use loramesh_crypto::RatchetState;
use tokio::sync::watch;

use super::types::{KeySource, SessionStats};

struct PeerSession {
    /// Set once this node has sent its own KEY_EXCHANGE to the peer.
    initiated: bool,
    /// `SHA-256(ecdh || base key)`, present once the handshake completed.
    secret: Option<[u8; 32]>,
    ratchet: Option<RatchetState>,
    /// Flips to `true` when the handshake completes.
    completed: watch::Sender<bool>,
}

impl PeerSession {
    fn new() -> Self {
        let (completed, _) = watch::channel(false);
        Self {
            initiated: false,
            secret: None,
            ratchet: None,
            completed,
        }
    }

    fn is_complete(&self) -> bool {
        self.secret.is_some()
    }
}

/// The single owner of every peer's session, ratchet and handshake state.
#[derive(Default)]
pub struct SessionStore {
    peers: Mutex<HashMap<NodeId, PeerSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NodeId, PeerSession>> {
        // Every update completes before the guard drops, so a poisoned map
        // is still consistent.
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a handshake with `peer` as initiated.
    ///
    /// Returns `true` only for the caller that flipped the marker while no
    /// session exists; every concurrent or later caller gets `false`.
    pub fn begin_handshake(&self, peer: NodeId) -> bool {
        let mut peers = self.lock();
        let entry = peers.entry(peer).or_insert_with(PeerSession::new);
        if entry.initiated || entry.is_complete() {
            return false;
        }
        entry.initiated = true;
        true
    }

    /// Clear the initiated marker after a failed handshake so a later send
    /// can try again. A completed session is left untouched.
    pub fn abandon_handshake(&self, peer: NodeId) {
        let mut peers = self.lock();
        if let Some(entry) = peers.get_mut(&peer)
            && !entry.is_complete()
        {
            entry.initiated = false;
        }
    }

    /// Install a completed session: store the secret, reseed both ratchets
    /// from it and release every waiter.
    ///
    /// Installing again for the same peer replaces the secret and restarts
    /// both ratchet chains.
    pub fn install(&self, peer: NodeId, secret: [u8; 32]) {
        let mut peers = self.lock();
        let entry = peers.entry(peer).or_insert_with(PeerSession::new);
        entry.secret = Some(secret);
        entry.ratchet = Some(RatchetState::new(secret));
        entry.initiated = true;
        entry.completed.send_replace(true);
    }

    pub fn has_session(&self, peer: NodeId) -> bool {
        self.lock().get(&peer).is_some_and(PeerSession::is_complete)
    }

    /// Wait until the session with `peer` completes, or `timeout` elapses.
    ///
    /// Returns immediately when the session already exists. A timed-out
    /// wait leaves no state behind beyond the peer's (empty) entry.
    pub async fn await_session(&self, peer: NodeId, timeout: Duration) -> bool {
        let mut completed = {
            let mut peers = self.lock();
            peers
                .entry(peer)
                .or_insert_with(PeerSession::new)
                .completed
                .subscribe()
        };
        let outcome = tokio::time::timeout(timeout, completed.wait_for(|done| *done)).await;
        matches!(outcome, Ok(Ok(_)))
    }

    /// Run `f` against the peer's key material with exclusive access to its
    /// ratchet.
    ///
    /// `f` receives the session secret (`None` before a handshake) and the
    /// ratchet state. A peer with no ratchet yet gets one seeded from
    /// `seed`, which is stored only if `f` succeeds, so a rejected first
    /// frame from an unknown peer leaves no trace. The whole call happens
    /// under the store lock, so a read, use and advance of a ratchet chain
    /// cannot interleave with another.
    pub fn with_ratchet<T, E>(
        &self,
        peer: NodeId,
        seed: &[u8; 32],
        f: impl FnOnce(Option<&[u8; 32]>, &mut RatchetState) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut peers = self.lock();
        if let Some(entry) = peers.get_mut(&peer)
            && let Some(ratchet) = entry.ratchet.as_mut()
        {
            return f(entry.secret.as_ref(), ratchet);
        }

        let secret = peers.get(&peer).and_then(|e| e.secret);
        let mut ratchet = RatchetState::new(*seed);
        let value = f(secret.as_ref(), &mut ratchet)?;
        peers.entry(peer).or_insert_with(PeerSession::new).ratchet = Some(ratchet);
        Ok(value)
    }

    pub fn stats(&self, peer: NodeId) -> SessionStats {
        let peers = self.lock();
        let entry = peers.get(&peer);
        match entry.and_then(|e| e.ratchet.as_ref().map(|r| (e, r))) {
            Some((entry, ratchet)) => SessionStats {
                peer,
                key: if entry.is_complete() {
                    KeySource::Ecdh
                } else {
                    KeySource::Base
                },
                send_counter: ratchet.send_counter(),
                recv_counter: ratchet.recv_counter(),
            },
            None => SessionStats {
                peer,
                key: KeySource::None,
                send_counter: 0,
                recv_counter: 0,
            },
        }
    }

    /// Peers with a completed session.
    pub fn established_peers(&self) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self
            .lock()
            .iter()
            .filter(|(_, e)| e.is_complete())
            .map(|(id, _)| *id)
            .collect();
        peers.sort();
        peers
    }
}
