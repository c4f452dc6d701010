//! X25519 key agreement for the per-peer handshake.
//!
//! Each node generates one [`IdentityKeyPair`] per process run. The public
//! half travels raw (32 bytes) in a KEY_EXCHANGE payload; the secret half is
//! reused against every peer, so it wraps a `StaticSecret` rather than a
//! single-use `EphemeralSecret`.

use x25519_dalek::{PublicKey, StaticSecret};

use crate::CryptoError;

/// Length of a serialized X25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// The node's key pair for the lifetime of the process.
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PeerPublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh key pair from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(rand::rngs::OsRng))
    }

    /// Rebuild a key pair from raw secret bytes (deterministic tests).
    ///
    /// Curve25519 clamping is applied by the library at use time.
    #[must_use]
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PeerPublicKey(PublicKey::from(&secret));
        Self { secret, public }
    }

    #[must_use]
    pub fn public_key(&self) -> &PeerPublicKey {
        &self.public
    }

    /// Serialized public key as carried in a KEY_EXCHANGE payload.
    #[must_use]
    pub fn export_public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Raw X25519 output against a peer's public key.
    ///
    /// Both sides computing `a.agree(&B)` and `b.agree(&A)` obtain the same
    /// 32 bytes.
    #[must_use]
    pub fn agree(&self, peer: &PeerPublicKey) -> [u8; 32] {
        *self.secret.diffie_hellman(&peer.0).as_bytes()
    }
}

/// A peer's X25519 public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerPublicKey(PublicKey);

impl PeerPublicKey {
    /// Parse a public key from a KEY_EXCHANGE payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(PublicKey::from(arr)))
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.0.as_bytes()
    }
}

impl AsRef<[u8]> for PeerPublicKey {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
