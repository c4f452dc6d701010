//! The mesh protocol engine.
//!
//! A [`Node`] owns one radio, one [`CryptoEngine`] and the dedup record.
//! Outbound sends run the handshake-if-needed flow and seal under the
//! peer's session (or the pre-shared key). Inbound frames go through
//! [`Node::handle`]: dedup, then deliver / relay / drop, then per-type
//! dispatch.
//!
//! ```text
//! send_chat(dst)                          handle(packet)
//!   │                                       │
//!   ├─ no session? ── KEY_EXCHANGE ──▶      ├─ duplicate ───────────▶ drop
//!   │               await (bounded)         ├─ dst != self ─────────▶ relay / drop
//!   ├─ seal (session or base key)           ├─ KEY_EXCHANGE ────────▶ install (+ reciprocate)
//!   └─ transmit, record (self, seq)         └─ open ─▶ CHAT / CMD ─▶ event + ACK
//!                                                      ACK ────────▶ event
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use loramesh_core::{MessageType, NodeId, Packet, PacketType};
use loramesh_interfaces::Radio;
use loramesh_protocol::session::engine::check_sealed_size;
use loramesh_protocol::{CryptoEngine, SessionError, SessionStats};
use loramesh_transport::relay::{self, DropReason, RelayDecision};
use loramesh_transport::SeenPackets;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::NodeSettings;
use crate::error::NodeError;
use crate::event::NodeEvent;
use crate::outcome::HandleOutcome;

/// Prefix of the decrypted ACK payload, followed by the acknowledged seq.
const ACK_PREFIX: &str = "ACK ";

/// Commands this node understands. Anything else is logged and still ACKed.
const PING: &str = "PING";

pub struct Node<R: Radio> {
    id: NodeId,
    radio: R,
    crypto: CryptoEngine,
    settings: NodeSettings,
    seen: Mutex<SeenPackets>,
    next_seq: AtomicU16,
    /// When we last answered each peer's KEY_EXCHANGE.
    key_replies: Mutex<HashMap<NodeId, Instant>>,
    /// Held from sealing to transmission so frames leave in ratchet order.
    send_order: tokio::sync::Mutex<()>,
    events_tx: mpsc::Sender<NodeEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<NodeEvent>>>,
    pub(crate) running: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R: Radio> Node<R> {
    /// Create a node with a fresh X25519 identity.
    pub fn new(id: NodeId, radio: R, settings: NodeSettings) -> Self {
        let crypto = CryptoEngine::new(settings.pre_shared_key.clone());
        Self::with_crypto(id, radio, settings, crypto)
    }

    /// Create a node around an existing crypto engine (fixed identities in tests).
    pub fn with_crypto(id: NodeId, radio: R, settings: NodeSettings, crypto: CryptoEngine) -> Self {
        let (events_tx, events_rx) = mpsc::channel(settings.event_buffer.max(1));
        Self {
            id,
            radio,
            crypto,
            settings,
            seen: Mutex::new(SeenPackets::new()),
            next_seq: AtomicU16::new(0),
            key_replies: Mutex::new(HashMap::new()),
            send_order: tokio::sync::Mutex::new(()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            running: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn crypto(&self) -> &CryptoEngine {
        &self.crypto
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    /// Take the event stream. Only the first call returns `Some`.
    ///
    /// Events are dropped (and logged) when the receiver is not drained
    /// fast enough or was never taken.
    pub fn events(&self) -> Option<mpsc::Receiver<NodeEvent>> {
        lock(&self.events_rx).take()
    }

    /// Session diagnostics for `peer`.
    pub fn stats(&self, peer: NodeId) -> SessionStats {
        self.crypto.stats(peer)
    }

    /// Number of `(src, seq)` pairs in the dedup record.
    pub fn seen_count(&self) -> usize {
        lock(&self.seen).len()
    }

    /// Send a CHAT. A private chat is flagged NO_FORWARD and only reaches
    /// a destination in direct range.
    ///
    /// Returns the sequence number the chat went out with, which the
    /// destination echoes back in its ACK.
    pub async fn send_chat(&self, dst: NodeId, text: &str, private: bool) -> Result<u16, NodeError> {
        let packet_type = PacketType::new(MessageType::Chat, private);
        self.send_to(dst, text, packet_type, self.settings.default_ttl).await
    }

    /// Send a CMD, e.g. `PING`.
    pub async fn send_command(&self, dst: NodeId, command: &str) -> Result<u16, NodeError> {
        self.send_to(dst, command, MessageType::Cmd.into(), self.settings.default_ttl)
            .await
    }

    /// Seal `text` for `dst` and put it on the air.
    ///
    /// When sessions are required and none exists yet, a handshake is run
    /// first and the call waits up to the handshake timeout for it. A
    /// timed-out handshake fails the send without transmitting anything.
    ///
    /// # Errors
    ///
    /// [`SessionError::OversizedPayload`] before any radio activity if the
    /// sealed text would not fit one frame,
    /// [`SessionError::HandshakeTimeout`] if the peer never answered, and
    /// [`NodeError::Radio`] if the radio refused the frame.
    pub async fn send_to(
        &self,
        dst: NodeId,
        text: &str,
        packet_type: PacketType,
        ttl: u8,
    ) -> Result<u16, NodeError> {
        check_sealed_size(text.len())?;
        self.ensure_session(dst, packet_type.is_no_forward()).await?;

        let seq = {
            let _order = self.send_order.lock().await;
            let sealed = self.seal_for(dst, text.as_bytes())?;
            self.transmit_new(dst, packet_type, ttl, sealed).await?
        };
        tracing::info!(
            node = %self.id,
            dst = %dst,
            seq,
            packet_type = %packet_type,
            "sent"
        );
        Ok(seq)
    }

    /// Run the handshake with `peer` unless a session already exists or
    /// sessions are optional.
    async fn ensure_session(&self, peer: NodeId, no_forward: bool) -> Result<(), NodeError> {
        if !self.settings.require_session || self.crypto.has_session(peer) {
            return Ok(());
        }

        if self.crypto.begin_handshake(peer) {
            if let Err(e) = self.send_key_exchange(peer, no_forward).await {
                self.crypto.abandon_handshake(peer);
                return Err(e);
            }
            tracing::debug!(node = %self.id, peer = %peer, "handshake initiated");
        }

        let timeout = self.settings.handshake_timeout;
        if self.crypto.await_session(peer, timeout).await {
            return Ok(());
        }

        self.crypto.abandon_handshake(peer);
        let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(node = %self.id, peer = %peer, waited_ms, "handshake timed out");
        Err(SessionError::HandshakeTimeout { peer, waited_ms }.into())
    }

    async fn send_key_exchange(&self, peer: NodeId, no_forward: bool) -> Result<u16, NodeError> {
        let packet_type = PacketType::new(MessageType::KeyExchange, no_forward);
        let public_key = self.crypto.export_public_key().to_vec();
        self.transmit_new(peer, packet_type, self.settings.default_ttl, public_key)
            .await
    }

    fn seal_for(&self, peer: NodeId, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        if self.crypto.has_session(peer) {
            self.crypto.encrypt(peer, plaintext)
        } else {
            self.crypto.encrypt_base(plaintext)
        }
    }

    fn open_from(&self, peer: NodeId, sealed: &[u8]) -> Result<Vec<u8>, SessionError> {
        if self.crypto.has_session(peer) {
            self.crypto.decrypt(peer, sealed)
        } else {
            self.crypto.decrypt_base(sealed)
        }
    }

    fn next_seq(&self) -> u16 {
        // Wraps at 65536.
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Build a packet with a fresh seq, record it as seen and transmit.
    async fn transmit_new(
        &self,
        dst: NodeId,
        packet_type: PacketType,
        ttl: u8,
        payload: Vec<u8>,
    ) -> Result<u16, NodeError> {
        let seq = self.next_seq();
        let packet = Packet::new(self.id, dst, packet_type, ttl, seq, payload)?;
        lock(&self.seen).insert(self.id, seq);
        self.radio.transmit(&packet.serialize()).await?;
        tracing::trace!(node = %self.id, frame = %packet, "transmitted");
        Ok(seq)
    }

    fn emit(&self, event: NodeEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            tracing::debug!(node = %self.id, "event not delivered: {e}");
        }
    }

    /// Process one inbound packet.
    ///
    /// Transmit failures for relays, ACKs and reciprocal key exchanges are
    /// logged and do not change the outcome.
    pub async fn handle(&self, packet: Packet) -> HandleOutcome {
        let is_new = lock(&self.seen).observe(&packet);

        match relay::decide(&packet, self.id, is_new) {
            RelayDecision::Drop(DropReason::Duplicate) => {
                tracing::trace!(
                    node = %self.id,
                    src = %packet.src(),
                    seq = packet.seq(),
                    "duplicate packet dropped"
                );
                HandleOutcome::Duplicate
            }
            RelayDecision::Drop(reason) => {
                tracing::debug!(node = %self.id, frame = %packet, ?reason, "packet not relayed");
                HandleOutcome::Dropped(reason)
            }
            RelayDecision::Forward(relayed) => {
                self.relay(relayed).await;
                HandleOutcome::Forwarded
            }
            RelayDecision::Deliver => self.deliver(packet).await,
        }
    }

    async fn relay(&self, relayed: Packet) {
        tracing::debug!(node = %self.id, frame = %relayed, "forwarding");
        self.emit(NodeEvent::Forwarded {
            src: relayed.src(),
            dst: relayed.dst(),
            seq: relayed.seq(),
            ttl: relayed.ttl(),
        });
        if let Err(e) = self.radio.transmit(&relayed.serialize()).await {
            tracing::warn!(node = %self.id, error = %e, "failed to forward packet");
        }
    }

    async fn deliver(&self, packet: Packet) -> HandleOutcome {
        let base = packet.packet_type().base_type();
        if base == Some(MessageType::KeyExchange) {
            return self.on_key_exchange(&packet).await;
        }

        let src = packet.src();
        let seq = packet.seq();
        let plaintext = match self.open_from(src, packet.payload()) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(node = %self.id, src = %src, seq, error = %e, "failed to decrypt packet");
                return HandleOutcome::DecryptFailed;
            }
        };
        let text = String::from_utf8_lossy(&plaintext).into_owned();

        match base {
            Some(MessageType::Chat) => {
                tracing::info!(node = %self.id, from = %src, seq, text = %text, "CHAT received");
                self.emit(NodeEvent::ChatReceived { from: src, seq, text });
                self.send_ack(src, seq).await;
                HandleOutcome::Delivered(MessageType::Chat)
            }
            Some(MessageType::Cmd) => {
                if text == PING {
                    tracing::info!(node = %self.id, from = %src, seq, "got PING");
                } else {
                    tracing::info!(node = %self.id, from = %src, seq, command = %text, "unknown CMD");
                }
                self.emit(NodeEvent::CommandReceived {
                    from: src,
                    seq,
                    command: text,
                });
                self.send_ack(src, seq).await;
                HandleOutcome::Delivered(MessageType::Cmd)
            }
            Some(MessageType::Ack) => {
                match parse_ack(&text) {
                    Some(acked_seq) => {
                        tracing::info!(node = %self.id, from = %src, acked_seq, "ACK received");
                        self.emit(NodeEvent::AckReceived { from: src, acked_seq });
                    }
                    None => {
                        tracing::warn!(node = %self.id, from = %src, seq, payload = %text, "malformed ACK");
                    }
                }
                HandleOutcome::Delivered(MessageType::Ack)
            }
            Some(MessageType::KeyExchange) | None => {
                let bits = packet.packet_type().base_bits();
                tracing::warn!(node = %self.id, from = %src, seq, "UNKNOWN type={bits} msg={text}");
                HandleOutcome::UnknownType(bits)
            }
        }
    }

    async fn on_key_exchange(&self, packet: &Packet) -> HandleOutcome {
        let peer = packet.src();
        let had_session = self.crypto.has_session(peer);
        let won = self.crypto.begin_handshake(peer);
        // An established peer re-sending its key has lost our reply. Answer
        // again, at most once per handshake timeout so two re-keying nodes
        // cannot bounce keys forever.
        let reciprocate = won || (had_session && self.may_answer_again(peer));

        if let Err(e) = self.crypto.process_peer_public_key(peer, packet.payload()) {
            tracing::warn!(node = %self.id, peer = %peer, error = %e, "rejected key exchange");
            if won {
                self.crypto.abandon_handshake(peer);
            }
            return HandleOutcome::HandshakeFailed;
        }

        tracing::info!(node = %self.id, peer = %peer, rekeyed = had_session, "session established");
        self.emit(NodeEvent::SessionEstablished { peer });

        if reciprocate {
            lock(&self.key_replies).insert(peer, Instant::now());
            let no_forward = packet.packet_type().is_no_forward();
            if let Err(e) = self.send_key_exchange(peer, no_forward).await {
                tracing::warn!(node = %self.id, peer = %peer, error = %e, "failed to answer key exchange");
            }
        }
        HandleOutcome::HandshakeCompleted {
            reciprocated: reciprocate,
        }
    }

    fn may_answer_again(&self, peer: NodeId) -> bool {
        lock(&self.key_replies)
            .get(&peer)
            .is_none_or(|last| last.elapsed() >= self.settings.handshake_timeout)
    }

    /// Acknowledge `(dst, acked_seq)` with a fresh seq of our own.
    ///
    /// The ACK frame does not reuse `acked_seq` as its header seq: that pair
    /// `(self.id, acked_seq)` may already be in every node's seen set from
    /// our own traffic, and the ACK would be dropped as a duplicate. Receivers
    /// read the acknowledged seq from the `ACK <seq>` payload instead.
    async fn send_ack(&self, dst: NodeId, acked_seq: u16) {
        let body = format!("{ACK_PREFIX}{acked_seq}");
        let _order = self.send_order.lock().await;
        let result = match self.seal_for(dst, body.as_bytes()) {
            Ok(sealed) => {
                self.transmit_new(dst, MessageType::Ack.into(), self.settings.ack_ttl, sealed)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(seq) => tracing::debug!(node = %self.id, dst = %dst, acked_seq, seq, "ACK sent"),
            Err(e) => tracing::warn!(node = %self.id, dst = %dst, acked_seq, error = %e, "failed to send ACK"),
        }
    }
}

/// Parse the acknowledged seq out of an `ACK <seq>` payload.
fn parse_ack(text: &str) -> Option<u16> {
    text.strip_prefix(ACK_PREFIX)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use loramesh_interfaces::{MediumConfig, SimMedium, SimRadio};
    use loramesh_protocol::KeySource;

    use super::*;

    const A: NodeId = NodeId::new(1);
    const B: NodeId = NodeId::new(2);
    const C: NodeId = NodeId::new(3);

    fn lossless() -> SimMedium {
        SimMedium::new(MediumConfig::lossless()).unwrap()
    }

    fn node(medium: &SimMedium, id: NodeId, settings: NodeSettings) -> Node<SimRadio> {
        Node::new(id, medium.attach(id), settings)
    }

    fn base_only() -> NodeSettings {
        NodeSettings {
            require_session: false,
            ..NodeSettings::default()
        }
    }

    async fn next_frame(node: &Node<SimRadio>) -> Packet {
        let frame = tokio::time::timeout(Duration::from_secs(1), node.radio().receive())
            .await
            .expect("no frame within 1s")
            .unwrap();
        Packet::parse(&frame).unwrap()
    }

    #[test]
    fn test_parse_ack() {
        assert_eq!(parse_ack("ACK 17"), Some(17));
        assert_eq!(parse_ack("ACK 65535"), Some(65535));
        assert_eq!(parse_ack("ACK"), None);
        assert_eq!(parse_ack("ACK x"), None);
        assert_eq!(parse_ack("NAK 3"), None);
        assert_eq!(parse_ack("ACK 70000"), None);
    }

    #[tokio::test]
    async fn test_base_key_chat_is_delivered_and_acked() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let b = node(&medium, B, base_only());
        let mut b_events = b.events().unwrap();

        // B's first seq is spent elsewhere so its ACK seq cannot equal A's.
        let warm_up = b.send_chat(C, "warm-up", false).await.unwrap();
        assert_eq!(next_frame(&a).await.seq(), warm_up);

        let seq = a.send_chat(B, "hi", false).await.unwrap();
        let chat = next_frame(&b).await;
        assert_eq!(chat.seq(), seq);
        assert_eq!(b.handle(chat).await, HandleOutcome::Delivered(MessageType::Chat));
        assert_eq!(
            b_events.recv().await.unwrap(),
            NodeEvent::ChatReceived {
                from: A,
                seq,
                text: "hi".into()
            }
        );

        let ack = next_frame(&a).await;
        assert_eq!(ack.packet_type().base_type(), Some(MessageType::Ack));
        assert_eq!(ack.ttl(), 3);
        assert_eq!(ack.src(), B);
        assert_eq!(ack.seq(), warm_up.wrapping_add(1), "ACK takes B's next seq");
        assert_ne!(ack.seq(), seq);

        let mut a_events = a.events().unwrap();
        assert_eq!(a.handle(ack).await, HandleOutcome::Delivered(MessageType::Ack));
        assert_eq!(
            a_events.recv().await.unwrap(),
            NodeEvent::AckReceived { from: B, acked_seq: seq }
        );
    }

    #[tokio::test]
    async fn test_events_taken_once() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        assert!(a.events().is_some());
        assert!(a.events().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_is_ignored() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let b = node(&medium, B, base_only());

        a.send_chat(B, "once", false).await.unwrap();
        let chat = next_frame(&b).await;
        assert!(b.handle(chat.clone()).await.is_delivered());
        assert_eq!(b.handle(chat).await, HandleOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_own_packet_reflected_back_is_duplicate() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let c = node(&medium, C, base_only());

        let seq = a.send_chat(B, "relay me", false).await.unwrap();
        let heard = next_frame(&c).await;
        assert_eq!(c.handle(heard).await, HandleOutcome::Forwarded);

        let reflected = next_frame(&a).await;
        assert_eq!(reflected.seq(), seq);
        assert_eq!(reflected.ttl(), 4);
        assert_eq!(a.handle(reflected).await, HandleOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_private_chat_not_relayed() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let c = node(&medium, C, base_only());

        a.send_chat(B, "secret", true).await.unwrap();
        let heard = next_frame(&c).await;
        assert!(heard.packet_type().is_no_forward());
        assert_eq!(
            c.handle(heard).await,
            HandleOutcome::Dropped(DropReason::NoForward)
        );
    }

    #[tokio::test]
    async fn test_expired_ttl_not_relayed() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let c = node(&medium, C, base_only());

        a.send_to(B, "last hop", MessageType::Chat.into(), 0)
            .await
            .unwrap();
        let heard = next_frame(&c).await;
        assert_eq!(
            c.handle(heard).await,
            HandleOutcome::Dropped(DropReason::TtlExpired)
        );
    }

    #[tokio::test]
    async fn test_forward_emits_event() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let c = node(&medium, C, base_only());
        let mut c_events = c.events().unwrap();

        let seq = a.send_chat(B, "via c", false).await.unwrap();
        let heard = next_frame(&c).await;
        c.handle(heard).await;
        assert_eq!(
            c_events.recv().await.unwrap(),
            NodeEvent::Forwarded {
                src: A,
                dst: B,
                seq,
                ttl: 4
            }
        );
    }

    #[tokio::test]
    async fn test_ping_and_unknown_command_both_acked() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let b = node(&medium, B, base_only());
        let mut b_events = b.events().unwrap();

        for command in ["PING", "REBOOT"] {
            let seq = a.send_command(B, command).await.unwrap();
            let frame = next_frame(&b).await;
            assert_eq!(b.handle(frame).await, HandleOutcome::Delivered(MessageType::Cmd));
            assert_eq!(
                b_events.recv().await.unwrap(),
                NodeEvent::CommandReceived {
                    from: A,
                    seq,
                    command: command.into()
                }
            );
            let ack = next_frame(&a).await;
            assert_eq!(ack.packet_type().base_type(), Some(MessageType::Ack));
        }
    }

    #[tokio::test]
    async fn test_wrong_network_key_fails_decrypt() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let other_network = NodeSettings {
            pre_shared_key: loramesh_protocol::PreSharedKey::new([0x55; 32]),
            ..base_only()
        };
        let b = node(&medium, B, other_network);

        a.send_chat(B, "hello", false).await.unwrap();
        let frame = next_frame(&b).await;
        assert_eq!(b.handle(frame).await, HandleOutcome::DecryptFailed);
    }

    #[tokio::test]
    async fn test_unknown_type_is_dropped_after_decrypt() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let b = node(&medium, B, base_only());

        a.send_to(B, "??", PacketType::from_byte(0x07), 5)
            .await
            .unwrap();
        let frame = next_frame(&b).await;
        assert_eq!(b.handle(frame).await, HandleOutcome::UnknownType(7));
    }

    #[tokio::test]
    async fn test_oversized_rejected_before_any_transmission() {
        let medium = lossless();
        let a = node(&medium, A, NodeSettings::default());
        let _b = node(&medium, B, NodeSettings::default());

        let text = "x".repeat(228);
        let err = a.send_chat(B, &text, false).await.unwrap_err();
        assert!(err.is_oversized());
        assert_eq!(medium.stats().transmissions, 0);
        assert_eq!(a.stats(B).key, KeySource::None);

        let fits = "x".repeat(227);
        assert!(check_sealed_size(fits.len()).is_ok());
    }

    #[tokio::test]
    async fn test_key_exchange_reciprocated_once() {
        let medium = lossless();
        let a = node(&medium, A, NodeSettings::default());
        let b = node(&medium, B, NodeSettings::default());
        let mut b_events = b.events().unwrap();

        assert!(a.crypto().begin_handshake(B));
        a.send_key_exchange(B, false).await.unwrap();

        let ke = next_frame(&b).await;
        assert_eq!(ke.payload().len(), 32);
        assert_eq!(
            b.handle(ke).await,
            HandleOutcome::HandshakeCompleted { reciprocated: true }
        );
        assert_eq!(
            b_events.recv().await.unwrap(),
            NodeEvent::SessionEstablished { peer: A }
        );

        let reply = next_frame(&a).await;
        assert_eq!(reply.packet_type().base_type(), Some(MessageType::KeyExchange));
        assert_eq!(
            a.handle(reply).await,
            HandleOutcome::HandshakeCompleted { reciprocated: false }
        );
        assert!(a.stats(B).established());
        assert!(b.stats(A).established());
    }

    #[tokio::test(start_paused = true)]
    async fn test_established_peer_rekey_is_answered_at_most_once_per_timeout() {
        let medium = lossless();
        let a = node(&medium, A, NodeSettings::default());
        let b = node(&medium, B, NodeSettings::default());

        assert!(a.crypto().begin_handshake(B));
        a.send_key_exchange(B, false).await.unwrap();
        let first = next_frame(&b).await;
        assert_eq!(
            b.handle(first).await,
            HandleOutcome::HandshakeCompleted { reciprocated: true }
        );
        // B's reply is never handed to A: it was lost.
        let _lost = next_frame(&a).await;

        a.crypto().abandon_handshake(B);
        assert!(a.crypto().begin_handshake(B));
        a.send_key_exchange(B, false).await.unwrap();
        let retry = next_frame(&b).await;
        // Inside the window: B does not answer yet.
        assert_eq!(
            b.handle(retry).await,
            HandleOutcome::HandshakeCompleted { reciprocated: false }
        );

        tokio::time::advance(NodeSettings::default().handshake_timeout).await;
        a.send_key_exchange(B, false).await.unwrap();
        let later = next_frame(&b).await;
        assert_eq!(
            b.handle(later).await,
            HandleOutcome::HandshakeCompleted { reciprocated: true }
        );
        let reply = next_frame(&a).await;
        assert_eq!(
            a.handle(reply).await,
            HandleOutcome::HandshakeCompleted { reciprocated: false }
        );
        assert!(a.crypto().has_session(B));
    }

    #[tokio::test]
    async fn test_key_exchange_inherits_no_forward() {
        let medium = lossless();
        let a = node(&medium, A, NodeSettings::default());
        let b = node(&medium, B, NodeSettings::default());

        assert!(a.crypto().begin_handshake(B));
        a.send_key_exchange(B, true).await.unwrap();
        let ke = next_frame(&b).await;
        assert!(ke.packet_type().is_no_forward());
        b.handle(ke).await;

        let reply = next_frame(&a).await;
        assert!(reply.packet_type().is_no_forward());
    }

    #[tokio::test]
    async fn test_bad_public_key_fails_handshake() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        let b = node(&medium, B, NodeSettings::default());

        a.transmit_new(B, MessageType::KeyExchange.into(), 5, vec![0u8; 31])
            .await
            .unwrap();
        let frame = next_frame(&b).await;
        assert_eq!(b.handle(frame).await, HandleOutcome::HandshakeFailed);
        assert!(!b.crypto().has_session(A));
        // The marker was released, so a later real handshake can start.
        assert!(b.crypto().begin_handshake(A));
    }

    #[tokio::test]
    async fn test_own_sends_recorded_in_dedup() {
        let medium = lossless();
        let a = node(&medium, A, base_only());
        assert_eq!(a.seen_count(), 0);
        a.send_chat(B, "one", false).await.unwrap();
        a.send_chat(B, "two", false).await.unwrap();
        assert_eq!(a.seen_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_sends_nothing_but_key_exchange() {
        let medium = lossless();
        let a = node(&medium, A, NodeSettings::default());

        let err = a.send_chat(B, "anyone?", false).await.unwrap_err();
        assert!(err.is_handshake_timeout());
        // Only the KEY_EXCHANGE left the radio.
        assert_eq!(medium.stats().transmissions, 1);
        // The marker was cleared so the next send initiates again.
        assert!(a.crypto().begin_handshake(B));
    }
}
