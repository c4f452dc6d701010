//! Error types for the mesh node.

use loramesh_core::PacketError;
use loramesh_interfaces::RadioError;
use loramesh_protocol::SessionError;

/// Errors returned by node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("frame error: {0}")]
    Frame(#[from] PacketError),
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("node not running")]
    NotRunning,
    #[error("node already running")]
    AlreadyRunning,
}

impl NodeError {
    /// The send was abandoned because the handshake did not complete in time.
    pub fn is_handshake_timeout(&self) -> bool {
        matches!(self, NodeError::Session(SessionError::HandshakeTimeout { .. }))
    }

    /// The message could not fit a single frame once sealed.
    pub fn is_oversized(&self) -> bool {
        matches!(
            self,
            NodeError::Session(SessionError::OversizedPayload { .. })
                | NodeError::Frame(PacketError::PayloadTooLarge { .. })
        )
    }
}
