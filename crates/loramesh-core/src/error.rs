//! Error types for the loramesh-core crate.

use core::fmt;

/// A frame that cannot be decoded, or a packet that cannot be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    TooShort { min: usize, actual: usize },
    LengthMismatch { declared: usize, available: usize },
    PayloadTooLarge { size: usize, max: usize },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::TooShort { min, actual } => {
                write!(
                    f,
                    "packet too short: need at least {min} bytes, got {actual}"
                )
            }
            PacketError::LengthMismatch {
                declared,
                available,
            } => {
                write!(
                    f,
                    "payload length mismatch: header declares {declared} bytes, {available} present"
                )
            }
            PacketError::PayloadTooLarge { size, max } => {
                write!(f, "payload too large: {size} bytes exceeds {max}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}
