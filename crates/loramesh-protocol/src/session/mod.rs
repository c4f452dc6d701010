//! Per-peer session state and the crypto engine built on it.
//!
//! # Handshake
//!
//! ```text
//! A                                          B
//! |-- KEY_EXCHANGE [A public key (32)] ----->|  B: begin_handshake(A) == true
//! |                                          |     process_peer_public_key(A)
//! |<----- KEY_EXCHANGE [B public key (32)] --|     reciprocate
//! |  process_peer_public_key(B)              |
//! |                                          |
//! |  Both: secret = SHA-256(ecdh || base key)|
//! |        ratchets seeded from secret       |
//! ```
//!
//! After the exchange every message key is
//! `SHA-256(secret || ratchet_key[direction])`, and the direction's ratchet
//! advances once per successful seal or open.

pub mod engine;
pub mod store;
pub mod types;

pub use engine::CryptoEngine;
pub use store::SessionStore;
pub use types::{KeySource, PreSharedKey, SessionStats};
