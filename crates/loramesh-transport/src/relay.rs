//! Pure inbound triage: deliver, relay or drop.
//!
//! Kept free of I/O so the flood rules can be tested without a running
//! node.

use loramesh_core::{NodeId, Packet};

/// Why an inbound packet is neither delivered nor relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `(src, seq)` was already processed.
    Duplicate,
    /// Not for this node and no hop budget left.
    TtlExpired,
    /// Not for this node and flagged private.
    NoForward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayDecision {
    /// Addressed to this node.
    Deliver,
    /// Relay this copy (one hop less, payload untouched).
    Forward(Packet),
    Drop(DropReason),
}

/// Decide what to do with an inbound packet.
///
/// `is_new` is the result of recording the packet in the dedup set.
/// Duplicates are dropped before anything else, so a node never reacts to
/// the same `(src, seq)` twice, including its own packets reflected back by
/// relays.
pub fn decide(packet: &Packet, local: NodeId, is_new: bool) -> RelayDecision {
    if !is_new {
        return RelayDecision::Drop(DropReason::Duplicate);
    }
    if packet.dst() == local {
        return RelayDecision::Deliver;
    }
    if packet.packet_type().is_no_forward() {
        return RelayDecision::Drop(DropReason::NoForward);
    }
    match packet.forwarded() {
        Some(relayed) => RelayDecision::Forward(relayed),
        None => RelayDecision::Drop(DropReason::TtlExpired),
    }
}

#[cfg(test)]
mod tests {
    use loramesh_core::{MessageType, PacketType};

    use super::*;

    const LOCAL: NodeId = NodeId::new(2);

    fn packet(dst: u8, packet_type: PacketType, ttl: u8) -> Packet {
        Packet::new(NodeId::new(1), NodeId::new(dst), packet_type, ttl, 9, vec![0xEE; 40]).unwrap()
    }

    #[test]
    fn addressed_packet_is_delivered() {
        let p = packet(2, MessageType::Chat.into(), 5);
        assert_eq!(decide(&p, LOCAL, true), RelayDecision::Deliver);
    }

    #[test]
    fn addressed_packet_delivered_at_zero_ttl_and_no_forward() {
        let p = packet(2, MessageType::Chat.with_no_forward(), 0);
        assert_eq!(decide(&p, LOCAL, true), RelayDecision::Deliver);
    }

    #[test]
    fn transit_packet_is_forwarded_with_ttl_minus_one() {
        let p = packet(3, MessageType::Chat.into(), 5);
        match decide(&p, LOCAL, true) {
            RelayDecision::Forward(fwd) => {
                assert_eq!(fwd.ttl(), 4);
                assert_eq!(fwd.payload(), p.payload());
                assert_eq!(fwd.src(), p.src());
                assert_eq!(fwd.seq(), p.seq());
            }
            other => panic!("expected forward, got {other:?}"),
        }
    }

    #[test]
    fn last_hop_forwarded_with_zero_ttl() {
        let p = packet(3, MessageType::Ack.into(), 1);
        match decide(&p, LOCAL, true) {
            RelayDecision::Forward(fwd) => assert_eq!(fwd.ttl(), 0),
            other => panic!("expected forward, got {other:?}"),
        }
    }

    #[test]
    fn zero_ttl_transit_packet_dropped() {
        let p = packet(3, MessageType::Chat.into(), 0);
        assert_eq!(
            decide(&p, LOCAL, true),
            RelayDecision::Drop(DropReason::TtlExpired)
        );
    }

    #[test]
    fn no_forward_transit_packet_dropped_regardless_of_ttl() {
        for ttl in [0u8, 1, 5, 255] {
            let p = packet(3, MessageType::Chat.with_no_forward(), ttl);
            assert_eq!(
                decide(&p, LOCAL, true),
                RelayDecision::Drop(DropReason::NoForward)
            );
        }
    }

    #[test]
    fn duplicate_wins_over_everything() {
        let p = packet(2, MessageType::Chat.into(), 5);
        assert_eq!(
            decide(&p, LOCAL, false),
            RelayDecision::Drop(DropReason::Duplicate)
        );
        let p = packet(3, MessageType::Chat.into(), 5);
        assert_eq!(
            decide(&p, LOCAL, false),
            RelayDecision::Drop(DropReason::Duplicate)
        );
    }

    #[test]
    fn unknown_type_still_relayed() {
        let p = packet(3, PacketType::from_byte(0x09), 2);
        assert!(matches!(decide(&p, LOCAL, true), RelayDecision::Forward(_)));
    }
}
