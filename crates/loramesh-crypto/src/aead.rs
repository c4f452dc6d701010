//! ChaCha20-Poly1305 sealing in the mesh wire layout.
//!
//! # Sealed layout
//!
//! ```text
//! [nonce: 12 bytes] || [ciphertext: len(plaintext)] || [Poly1305 tag: 16 bytes]
//! ```
//!
//! Nonces are never derived from a counter. Session traffic uses
//! [`derive_nonce`] (timestamp, peer id and fresh entropy hashed together);
//! base-key traffic uses [`random_nonce`].

use alloc::vec::Vec;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

use crate::CryptoError;
use crate::sha::Sha256Hasher;

pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

/// Bytes added to every plaintext by [`seal`].
pub const AEAD_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Derive a 12-byte nonce as `SHA-256(timestamp_ms || peer || entropy)[..12]`.
///
/// All integers are big-endian. Collision resistance comes from `entropy`;
/// the timestamp and peer id only separate domains.
#[must_use]
pub fn derive_nonce(timestamp_ms: u64, peer: u32, entropy: &[u8; 8]) -> [u8; NONCE_SIZE] {
    let mut hasher = Sha256Hasher::new();
    hasher.update(&timestamp_ms.to_be_bytes());
    hasher.update(&peer.to_be_bytes());
    hasher.update(entropy);
    let digest = hasher.finalize();

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}

/// Draw eight bytes of process randomness for [`derive_nonce`].
#[must_use]
pub fn nonce_entropy() -> [u8; 8] {
    let mut entropy = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    entropy
}

/// A nonce drawn directly from the OS CSPRNG.
#[must_use]
pub fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `plaintext` under `key` with an explicit nonce.
///
/// Returns `nonce || ciphertext || tag`.
pub fn seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Verify and decrypt a `nonce || ciphertext || tag` blob.
///
/// # Errors
///
/// [`CryptoError::CiphertextTooShort`] if the input cannot hold a nonce and
/// a tag, [`CryptoError::AuthenticationFailed`] if the tag does not verify.
pub fn open(key: &[u8; 32], input: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if input.len() < AEAD_OVERHEAD {
        return Err(CryptoError::CiphertextTooShort {
            min: AEAD_OVERHEAD,
            actual: input.len(),
        });
    }

    let (nonce, body) = input.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), body)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn test_seal_layout() {
        let nonce = [0x07u8; NONCE_SIZE];
        let sealed = seal(&KEY, &nonce, b"hello mesh").unwrap();
        assert_eq!(sealed.len(), b"hello mesh".len() + AEAD_OVERHEAD);
        assert_eq!(&sealed[..NONCE_SIZE], &nonce);
    }

    #[test]
    fn test_seal_open_round_trip() {
        let sealed = seal(&KEY, &random_nonce(), b"PING").unwrap();
        assert_eq!(open(&KEY, &sealed).unwrap(), b"PING");
    }

    #[test]
    fn test_empty_plaintext_is_exactly_overhead() {
        let sealed = seal(&KEY, &random_nonce(), b"").unwrap();
        assert_eq!(sealed.len(), AEAD_OVERHEAD);
        assert!(open(&KEY, &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_open_wrong_key_fails_auth() {
        let sealed = seal(&KEY, &random_nonce(), b"secret").unwrap();
        assert_eq!(
            open(&[0x43; 32], &sealed).unwrap_err(),
            CryptoError::AuthenticationFailed
        );
    }

    #[test]
    fn test_open_tampered_ciphertext_fails_auth() {
        let mut sealed = seal(&KEY, &random_nonce(), b"secret").unwrap();
        sealed[NONCE_SIZE] ^= 0x01;
        assert_eq!(open(&KEY, &sealed).unwrap_err(), CryptoError::AuthenticationFailed);
    }

    #[test]
    fn test_open_tampered_nonce_fails_auth() {
        let mut sealed = seal(&KEY, &random_nonce(), b"secret").unwrap();
        sealed[0] ^= 0x80;
        assert!(open(&KEY, &sealed).is_err());
    }

    #[test]
    fn test_open_too_short() {
        for len in [0usize, 1, NONCE_SIZE, AEAD_OVERHEAD - 1] {
            let err = open(&KEY, &vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                CryptoError::CiphertextTooShort {
                    min: AEAD_OVERHEAD,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn test_derive_nonce_is_deterministic_per_input() {
        let entropy = [9u8; 8];
        assert_eq!(
            derive_nonce(1_700_000_000_000, 2, &entropy),
            derive_nonce(1_700_000_000_000, 2, &entropy)
        );
    }

    #[test]
    fn test_derive_nonce_separates_peers_and_entropy() {
        let base = derive_nonce(1_000, 2, &[0u8; 8]);
        assert_ne!(base, derive_nonce(1_000, 3, &[0u8; 8]));
        assert_ne!(base, derive_nonce(1_000, 2, &[1u8; 8]));
        assert_ne!(base, derive_nonce(1_001, 2, &[0u8; 8]));
    }

    #[test]
    fn test_derive_nonce_matches_hash_prefix() {
        let mut material = Vec::new();
        material.extend_from_slice(&5u64.to_be_bytes());
        material.extend_from_slice(&7u32.to_be_bytes());
        material.extend_from_slice(&[0xAB; 8]);
        let digest = crate::sha::sha256(&material);
        assert_eq!(derive_nonce(5, 7, &[0xAB; 8]).as_slice(), &digest[..NONCE_SIZE]);
    }
}
