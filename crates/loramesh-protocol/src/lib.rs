//! Session layer for the LoRa mesh stack.
//!
//! This crate owns everything a node keeps per peer: the handshake marker,
//! the derived session secret, the send/receive ratchets and the completion
//! signal send paths wait on. [`CryptoEngine`] composes those with the
//! primitives from `loramesh-crypto` into the encrypt/decrypt operations the
//! mesh engine calls.

pub mod error;
pub mod session;

pub use error::SessionError;
pub use session::{CryptoEngine, KeySource, PreSharedKey, SessionStats, SessionStore};
