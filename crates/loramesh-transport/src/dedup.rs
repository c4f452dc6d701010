//! Duplicate suppression keyed by `(src, seq)`.
//!
//! The record has no eviction: every pair seen stays for the life of the
//! process. Sequence numbers are 16-bit, so after a sender wraps past
//! 65535 its new packets collide with remembered ones and are discarded.

use std::collections::HashSet;

use loramesh_core::{NodeId, Packet};

/// Set of `(src, seq)` pairs a node has already processed.
#[derive(Debug, Default)]
pub struct SeenPackets {
    seen: HashSet<(NodeId, u16)>,
}

impl SeenPackets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, src: NodeId, seq: u16) -> bool {
        self.seen.contains(&(src, seq))
    }

    /// Record a pair and return `true` if it was new (not a duplicate).
    pub fn insert(&mut self, src: NodeId, seq: u16) -> bool {
        self.seen.insert((src, seq))
    }

    /// Record the identity of `packet`; see [`insert`](Self::insert).
    pub fn observe(&mut self, packet: &Packet) -> bool {
        self.insert(packet.src(), packet.seq())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
