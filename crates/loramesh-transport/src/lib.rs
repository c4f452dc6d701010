//! Forwarding layer for the LoRa mesh stack.
//!
//! Flood routing has no tables: every node remembers which `(src, seq)`
//! pairs it has already processed and relays anything else not addressed to
//! it while hop budget remains.

pub mod dedup;
pub mod relay;

pub use dedup::SeenPackets;
pub use relay::{DropReason, RelayDecision, decide};
