//! SHA-256 hashing.
//!
//! Every derivation in the mesh (session secrets, per-message keys, ratchet
//! steps, nonces) is a SHA-256 over a concatenation of fields, so the
//! streaming hasher is the primary interface and [`sha256`] a shorthand.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the given data.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute `SHA-256(a || b)` without allocating the concatenation.
#[must_use]
pub fn sha256_concat(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256Hasher::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize()
}

/// A streaming SHA-256 hasher that allows incremental feeding of data.
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consume the hasher and return the final digest.
    #[must_use]
    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}
