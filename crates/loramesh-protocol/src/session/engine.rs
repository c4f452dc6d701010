//! Handshake and AEAD operations keyed by peer.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use loramesh_core::NodeId;
use loramesh_core::constants::MAX_PAYLOAD;
use loramesh_crypto::aead::{self, AEAD_OVERHEAD};
use loramesh_crypto::sha::sha256_concat;
use loramesh_crypto::x25519::{IdentityKeyPair, PUBLIC_KEY_SIZE, PeerPublicKey};
use loramesh_crypto::Direction;

use super::store::SessionStore;
use super::types::{PreSharedKey, SessionStats};
use crate::error::SessionError;

/// Per-node crypto: one X25519 identity for the process run, the network's
/// pre-shared key, and the session store.
pub struct CryptoEngine {
    identity: IdentityKeyPair,
    base_key: PreSharedKey,
    sessions: SessionStore,
}

impl CryptoEngine {
    /// Create an engine with a freshly generated key pair.
    pub fn new(base_key: PreSharedKey) -> Self {
        Self::with_identity(IdentityKeyPair::generate(), base_key)
    }

    pub fn with_identity(identity: IdentityKeyPair, base_key: PreSharedKey) -> Self {
        Self {
            identity,
            base_key,
            sessions: SessionStore::new(),
        }
    }

    /// The local public key as carried in a KEY_EXCHANGE payload.
    pub fn export_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.identity.export_public_key()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// See [`SessionStore::begin_handshake`].
    pub fn begin_handshake(&self, peer: NodeId) -> bool {
        self.sessions.begin_handshake(peer)
    }

    pub fn abandon_handshake(&self, peer: NodeId) {
        self.sessions.abandon_handshake(peer);
    }

    /// Complete the handshake with `peer` from its KEY_EXCHANGE payload.
    ///
    /// Derives `SHA-256(ecdh || base key)`, installs fresh ratchets seeded
    /// from it and wakes every caller waiting on this peer.
    pub fn process_peer_public_key(&self, peer: NodeId, bytes: &[u8]) -> Result<(), SessionError> {
        let public = PeerPublicKey::from_slice(bytes).map_err(|_| {
            SessionError::InvalidPublicKey {
                peer,
                actual: bytes.len(),
            }
        })?;
        let shared = self.identity.agree(&public);
        let secret = sha256_concat(&shared, self.base_key.as_bytes());
        self.sessions.install(peer, secret);
        tracing::debug!(peer = %peer, "session secret derived");
        Ok(())
    }

    pub fn has_session(&self, peer: NodeId) -> bool {
        self.sessions.has_session(peer)
    }

    pub async fn await_session(&self, peer: NodeId, timeout: Duration) -> bool {
        self.sessions.await_session(peer, timeout).await
    }

    /// Seal `plaintext` for `peer` under the current send ratchet key.
    ///
    /// The send chain advances only when sealing succeeds. Plaintexts whose
    /// sealed form would not fit a frame are rejected without touching the
    /// ratchet.
    pub fn encrypt(&self, peer: NodeId, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        check_sealed_size(plaintext.len())?;
        let nonce = aead::derive_nonce(unix_millis(), u32::from(peer.get()), &aead::nonce_entropy());

        self.sessions.with_ratchet(
            peer,
            self.base_key.as_bytes(),
            |secret, ratchet| -> Result<_, SessionError> {
                let material = secret.unwrap_or(self.base_key.as_bytes());
                let chain = ratchet.chain_mut(Direction::Send);
                let key = sha256_concat(material, chain.current_key());
                let sealed = aead::seal(&key, &nonce, plaintext)?;
                chain.advance();
                Ok(sealed)
            },
        )
    }

    /// Open a `nonce || ciphertext || tag` blob from `peer` under the
    /// current receive ratchet key.
    ///
    /// A failed open leaves the receive chain where it was.
    pub fn decrypt(&self, peer: NodeId, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        self.sessions.with_ratchet(
            peer,
            self.base_key.as_bytes(),
            |secret, ratchet| -> Result<_, SessionError> {
                let material = secret.unwrap_or(self.base_key.as_bytes());
                let chain = ratchet.chain_mut(Direction::Receive);
                let key = sha256_concat(material, chain.current_key());
                let opened = aead::open(&key, sealed)?;
                chain.advance();
                Ok(opened)
            },
        )
    }

    /// Seal directly under the pre-shared key with a random nonce.
    ///
    /// No ratchet is involved; this is the pre-session fallback.
    pub fn encrypt_base(&self, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        check_sealed_size(plaintext.len())?;
        Ok(aead::seal(
            self.base_key.as_bytes(),
            &aead::random_nonce(),
            plaintext,
        )?)
    }

    pub fn decrypt_base(&self, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        Ok(aead::open(self.base_key.as_bytes(), sealed)?)
    }

    pub fn stats(&self, peer: NodeId) -> SessionStats {
        self.sessions.stats(peer)
    }
}

/// Reject a plaintext whose sealed form would not fit one frame payload.
pub fn check_sealed_size(plaintext_len: usize) -> Result<(), SessionError> {
    let size = plaintext_len + AEAD_OVERHEAD;
    if size > MAX_PAYLOAD {
        return Err(SessionError::OversizedPayload {
            size,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
