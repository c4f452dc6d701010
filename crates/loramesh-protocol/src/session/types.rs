//! Value types shared by the session store and the crypto engine.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use loramesh_core::NodeId;

use crate::error::SessionError;

/// Base64 form of the network's built-in pre-shared key.
pub const DEFAULT_PRE_SHARED_KEY_B64: &str = "8m7FZ5i7g2zQqZ4X7qX4yY0o5S8+H3y0uA7c3bTtq2Q=";

const DEFAULT_PRE_SHARED_KEY: [u8; 32] = [
    0xf2, 0x6e, 0xc5, 0x67, 0x98, 0xbb, 0x83, 0x6c, 0xd0, 0xa9, 0x9e, 0x17, 0xee, 0xa5, 0xf8, 0xc9,
    0x8d, 0x28, 0xe5, 0x2f, 0x3e, 0x1f, 0x7c, 0xb4, 0xb8, 0x0e, 0xdc, 0xdd, 0xb4, 0xed, 0xab, 0x64,
];

/// The static 256-bit key every node on the network shares.
///
/// Used directly for pre-session traffic and mixed into every session
/// secret.
#[derive(Clone, PartialEq, Eq)]
pub struct PreSharedKey([u8; 32]);

impl PreSharedKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Decode a standard-alphabet base64 key that must be exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, SessionError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SessionError::InvalidPreSharedKey(e.to_string()))?;
        let key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SessionError::InvalidPreSharedKey(format!(
                "expected 32 bytes, decoded {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Default for PreSharedKey {
    fn default() -> Self {
        Self(DEFAULT_PRE_SHARED_KEY)
    }
}

impl fmt::Debug for PreSharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PreSharedKey(..)")
    }
}

/// Which key material currently protects traffic with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// No ratcheted traffic has happened with this peer.
    None,
    /// Ratchet seeded from the pre-shared key; no handshake yet.
    Base,
    /// Ratchet seeded from a completed X25519 handshake.
    Ecdh,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeySource::None => "none",
            KeySource::Base => "base",
            KeySource::Ecdh => "ecdh",
        })
    }
}

/// Diagnostic snapshot of one peer's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub peer: NodeId,
    pub key: KeySource,
    pub send_counter: u32,
    pub recv_counter: u32,
}

impl SessionStats {
    pub fn established(&self) -> bool {
        self.key == KeySource::Ecdh
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            KeySource::None => write!(f, "peer {} key=none", self.peer),
            key => write!(
                f,
                "peer {} key={key} send={} recv={}",
                self.peer, self.send_counter, self.recv_counter
            ),
        }
    }
}
