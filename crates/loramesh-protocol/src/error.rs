//! Session layer error types.

use loramesh_core::NodeId;
use loramesh_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Auth(#[from] CryptoError),

    #[error("payload too large: {size} bytes sealed exceeds {max}")]
    OversizedPayload { size: usize, max: usize },

    #[error("handshake with peer {peer} timed out after {waited_ms} ms")]
    HandshakeTimeout { peer: NodeId, waited_ms: u64 },

    #[error("invalid public key from peer {peer}: {actual} bytes")]
    InvalidPublicKey { peer: NodeId, actual: usize },

    #[error("invalid pre-shared key: {0}")]
    InvalidPreSharedKey(String),
}

impl SessionError {
    /// Whether the failure was an AEAD verification failure on inbound data.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SessionError::Auth(e) if e.is_auth_failure())
    }
}
