//! One-way hash ratchet.
//!
//! A [`RatchetChain`] is a 256-bit key plus a use counter. After every
//! successful use the key is replaced by `SHA-256(key || counter)` (counter
//! as big-endian `u32`, taken before it increments), so an exposed key never
//! reveals earlier ones.
//!
//! A [`RatchetState`] holds one chain per direction. Both chains start from
//! the same seed, so A's send chain and B's receive chain walk in lockstep as
//! long as every message is delivered exactly once and in order. A missed or
//! reordered message leaves the two sides on different steps and every
//! later message for that direction fails authentication.

use core::fmt;

use crate::sha::Sha256Hasher;

/// A single direction's key chain.
#[derive(Clone, PartialEq, Eq)]
pub struct RatchetChain {
    key: [u8; 32],
    counter: u32,
}

impl RatchetChain {
    #[must_use]
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            key: seed,
            counter: 0,
        }
    }

    /// The key for the next message in this direction.
    #[must_use]
    pub fn current_key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Number of times the chain has advanced.
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Step the chain: `key = SHA-256(key || counter_be)`, then `counter += 1`.
    pub fn advance(&mut self) {
        let mut hasher = Sha256Hasher::new();
        hasher.update(&self.key);
        hasher.update(&self.counter.to_be_bytes());
        self.key = hasher.finalize();
        self.counter = self.counter.wrapping_add(1);
    }
}

impl fmt::Debug for RatchetChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("RatchetChain")
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

/// Which chain of a [`RatchetState`] an operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// Independent send and receive chains for one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatchetState {
    send: RatchetChain,
    recv: RatchetChain,
}

impl RatchetState {
    /// Both chains start from `seed`.
    #[must_use]
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            send: RatchetChain::new(seed),
            recv: RatchetChain::new(seed),
        }
    }

    #[must_use]
    pub fn chain(&self, direction: Direction) -> &RatchetChain {
        match direction {
            Direction::Send => &self.send,
            Direction::Receive => &self.recv,
        }
    }

    pub fn chain_mut(&mut self, direction: Direction) -> &mut RatchetChain {
        match direction {
            Direction::Send => &mut self.send,
            Direction::Receive => &mut self.recv,
        }
    }

    #[must_use]
    pub fn send_counter(&self) -> u32 {
        self.send.counter
    }

    #[must_use]
    pub fn recv_counter(&self) -> u32 {
        self.recv.counter
    }
}
