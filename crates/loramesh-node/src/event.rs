//! Application-facing events emitted by a running node.

use loramesh_core::NodeId;

/// Something the application may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A CHAT addressed to this node was decrypted.
    ChatReceived { from: NodeId, seq: u16, text: String },
    /// A CMD addressed to this node was decrypted.
    CommandReceived { from: NodeId, seq: u16, command: String },
    /// A peer acknowledged one of this node's packets.
    AckReceived { from: NodeId, acked_seq: u16 },
    /// A handshake with `peer` completed (or was re-keyed).
    SessionEstablished { peer: NodeId },
    /// This node relayed a packet addressed elsewhere. `ttl` is the
    /// decremented value that went back on the air.
    Forwarded { src: NodeId, dst: NodeId, seq: u16, ttl: u8 },
}
