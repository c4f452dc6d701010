//! What [`Node::handle`](crate::Node::handle) did with one inbound packet.
//!
//! Pure data so dispatch can be asserted on without watching the radio.

use loramesh_core::MessageType;
use loramesh_transport::DropReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// `(src, seq)` was already seen.
    Duplicate,
    /// Not for us and not relayable.
    Dropped(DropReason),
    /// Relayed with a decremented TTL.
    Forwarded,
    /// A KEY_EXCHANGE installed a session; `reciprocated` if we answered
    /// with our own public key.
    HandshakeCompleted { reciprocated: bool },
    /// A KEY_EXCHANGE payload was not a usable public key.
    HandshakeFailed,
    /// Decrypted and dispatched.
    Delivered(MessageType),
    /// The payload failed authentication under the expected key.
    DecryptFailed,
    /// Decrypted, but the base type is not one this node understands.
    UnknownType(u8),
}

impl HandleOutcome {
    /// Whether the packet reached the application layer.
    pub fn is_delivered(&self) -> bool {
        matches!(self, HandleOutcome::Delivered(_))
    }
}
