//! Packet wire format parsing and serialization.
//!
//! ```text
//! byte 0:   src id
//! byte 1:   dst id
//! byte 2:   type (see [`PacketType`])
//! byte 3:   ttl
//! byte 4-5: seq, big-endian
//! byte 6:   payload length L
//! byte 7..: L payload bytes
//! ```

use alloc::vec::Vec;
use core::fmt;

use crate::constants::{HEADER_SIZE, MAX_PAYLOAD};
use crate::error::PacketError;
use crate::packet::kind::PacketType;
use crate::types::NodeId;

/// A mesh packet. Immutable once built; relays derive a new one with
/// [`Packet::forwarded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    src: NodeId,
    dst: NodeId,
    packet_type: PacketType,
    ttl: u8,
    seq: u16,
    payload: Vec<u8>,
}

impl Packet {
    /// Build a packet, rejecting payloads that do not fit the length byte.
    pub fn new(
        src: NodeId,
        dst: NodeId,
        packet_type: PacketType,
        ttl: u8,
        seq: u16,
        payload: Vec<u8>,
    ) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self {
            src,
            dst,
            packet_type,
            ttl,
            seq,
            payload,
        })
    }

    /// Parse a packet from wire bytes.
    ///
    /// Bytes past the declared payload length are ignored.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        if raw.len() < HEADER_SIZE {
            return Err(PacketError::TooShort {
                min: HEADER_SIZE,
                actual: raw.len(),
            });
        }

        let declared = raw[6] as usize;
        let available = raw.len() - HEADER_SIZE;
        if available < declared {
            return Err(PacketError::LengthMismatch {
                declared,
                available,
            });
        }

        Ok(Self {
            src: NodeId::new(raw[0]),
            dst: NodeId::new(raw[1]),
            packet_type: PacketType::from_byte(raw[2]),
            ttl: raw[3],
            seq: u16::from_be_bytes([raw[4], raw[5]]),
            payload: raw[HEADER_SIZE..HEADER_SIZE + declared].to_vec(),
        })
    }

    /// Serialize the packet to wire format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        out.push(self.src.get());
        out.push(self.dst.get());
        out.push(self.packet_type.to_byte());
        out.push(self.ttl);
        out.extend_from_slice(&self.seq.to_be_bytes());
        // `new` guarantees the length fits in a byte.
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// The relayed copy of this packet, one hop poorer.
    ///
    /// Returns `None` when the hop budget is exhausted. The payload is
    /// carried unchanged.
    pub fn forwarded(&self) -> Option<Packet> {
        let ttl = self.ttl.checked_sub(1)?;
        Some(Packet {
            ttl,
            payload: self.payload.clone(),
            ..*self
        })
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn seq(&self) -> u16 {
        self.seq
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet{{src={}, dst={}, type={}, ttl={}, seq={}, len={}}}",
            self.src,
            self.dst,
            self.packet_type,
            self.ttl,
            self.seq,
            self.payload.len()
        )
    }
}
