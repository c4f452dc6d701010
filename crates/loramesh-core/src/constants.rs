//! Protocol constants and the base message types.

use core::fmt;

// Wire format sizes
pub const HEADER_SIZE: usize = 7;
pub const MAX_PAYLOAD: usize = 255;
pub const MAX_FRAME: usize = HEADER_SIZE + MAX_PAYLOAD; // 262

// Hop budgets
pub const DEFAULT_TTL: u8 = 5;
pub const ACK_TTL: u8 = 3;

// Type byte layout
pub const BASE_TYPE_MASK: u8 = 0x0F;
pub const FLAG_NO_FORWARD: u8 = 1 << 4;

/// Base message type carried in the low four bits of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Chat = 0,
    Cmd = 1,
    Ack = 2,
    KeyExchange = 3,
}

impl MessageType {
    /// Map a base type nibble to a known message type.
    ///
    /// Returns `None` for values the protocol does not define. Such packets
    /// still decode; the node drops them at dispatch.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(MessageType::Chat),
            1 => Some(MessageType::Cmd),
            2 => Some(MessageType::Ack),
            3 => Some(MessageType::KeyExchange),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::Chat => "CHAT",
            MessageType::Cmd => "CMD",
            MessageType::Ack => "ACK",
            MessageType::KeyExchange => "KEY_EXCHANGE",
        }
    }

    /// Whether payloads of this type are AEAD-sealed.
    pub fn is_encrypted(self) -> bool {
        !matches!(self, MessageType::KeyExchange)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
