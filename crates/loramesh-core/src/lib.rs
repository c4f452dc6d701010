//! Core types, constants, and wire format for the LoRa mesh stack.
//!
//! This crate defines node addressing, the message type byte with its
//! NO_FORWARD flag, and the fixed 7-byte-header packet codec shared by every
//! node on the medium.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod packet;
pub mod types;

pub use constants::MessageType;
pub use error::PacketError;
pub use packet::Packet;
pub use packet::kind::PacketType;
pub use types::NodeId;
