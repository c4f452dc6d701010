//! Cryptographic primitives for the LoRa mesh stack.
//!
//! This crate provides the building blocks the session layer composes:
//! SHA-256 hashing, X25519 key agreement, ChaCha20-Poly1305 sealing
//! in the `nonce || ciphertext || tag` wire layout, and the one-way hash
//! ratchet that evolves per-direction keys after every use.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod aead;
pub mod error;
pub mod ratchet;
pub mod sha;
pub mod x25519;

pub use aead::{AEAD_OVERHEAD, NONCE_SIZE, TAG_SIZE};
pub use error::CryptoError;
pub use ratchet::{Direction, RatchetChain, RatchetState};
