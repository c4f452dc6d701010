//! Packet type byte encoding and decoding.
//!
//! The type byte layout:
//! ```text
//! Bits 7-5: unused (reserved, carried through unchanged)
//! Bit 4:    NO_FORWARD (1 = private/direct, never relayed)
//! Bits 3-0: base type (0=CHAT, 1=CMD, 2=ACK, 3=KEY_EXCHANGE)
//! ```
//!
//! Decoding never fails: an undefined base type is preserved so relays can
//! still forward it and the destination can log and drop it.

use core::fmt;

use crate::constants::{BASE_TYPE_MASK, FLAG_NO_FORWARD, MessageType};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(u8);

impl PacketType {
    pub const fn new(base: MessageType, no_forward: bool) -> Self {
        let byte = base as u8;
        if no_forward {
            Self(byte | FLAG_NO_FORWARD)
        } else {
            Self(byte)
        }
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub const fn to_byte(self) -> u8 {
        self.0
    }

    /// The raw low nibble, including values with no [`MessageType`].
    pub const fn base_bits(self) -> u8 {
        self.0 & BASE_TYPE_MASK
    }

    pub fn base_type(self) -> Option<MessageType> {
        MessageType::from_u8(self.base_bits())
    }

    pub const fn is_no_forward(self) -> bool {
        self.0 & FLAG_NO_FORWARD != 0
    }

    pub const fn with_no_forward(self) -> Self {
        Self(self.0 | FLAG_NO_FORWARD)
    }
}

impl MessageType {
    /// This base type with the NO_FORWARD flag set.
    pub const fn with_no_forward(self) -> PacketType {
        PacketType::new(self, true)
    }
}

impl From<MessageType> for PacketType {
    fn from(base: MessageType) -> Self {
        PacketType::new(base, false)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base_type() {
            Some(base) => write!(f, "{base}")?,
            None => write!(f, "UNKNOWN({})", self.base_bits())?,
        }
        if self.is_no_forward() {
            write!(f, "|NO_FORWARD")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketType(0x{:02x} {self})", self.0)
    }
}
