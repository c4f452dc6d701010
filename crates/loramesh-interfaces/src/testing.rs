//! Generic conformance assertions for [`Radio`] implementations.
//!
//! Every radio the mesh engine runs on must satisfy these, whatever its
//! physical layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use loramesh_interfaces::testing;
//!
//! let radio = medium.attach(NodeId::new(1));
//! testing::assert_pre_stop_conformance(&radio).await;
//! testing::assert_stop_conformance(&radio).await;
//! ```

use std::time::Duration;

use crate::error::RadioError;
use crate::traits::Radio;

/// Assert that the radio has a non-empty name.
pub fn assert_has_name(radio: &impl Radio) {
    assert!(!radio.name().is_empty(), "radio name must not be empty");
}

/// Assert that a frame larger than the MTU is refused.
pub async fn assert_oversized_frame_rejected(radio: &impl Radio) {
    let frame = vec![0x42; radio.mtu() + 1];
    match radio.transmit(&frame).await {
        Err(RadioError::FrameTooLarge { size, max }) => {
            assert_eq!(size, frame.len());
            assert_eq!(max, radio.mtu());
        }
        other => panic!("oversized transmit should fail with FrameTooLarge, got {other:?}"),
    }
}

/// Assert that a frame of exactly the MTU is accepted.
pub async fn assert_mtu_frame_accepted(radio: &impl Radio) {
    let result = radio.transmit(&vec![0x42; radio.mtu()]).await;
    assert!(result.is_ok(), "MTU-sized transmit failed: {:?}", result.err());
}

/// Assert that `stop()` succeeds and leaves the radio offline.
pub async fn assert_stop_is_clean(radio: &impl Radio) {
    let result = radio.stop().await;
    assert!(result.is_ok(), "stop() should succeed: {:?}", result.err());
    assert!(!radio.is_online(), "is_online() should be false after stop()");
}

/// Assert that calling `stop()` a second time does not error.
pub async fn assert_double_stop_is_idempotent(radio: &impl Radio) {
    let _ = radio.stop().await;
    let result = radio.stop().await;
    assert!(
        result.is_ok(),
        "second stop() should be idempotent: {:?}",
        result.err()
    );
}

/// Assert that `receive()` on a stopped radio returns `Stopped` promptly.
pub async fn assert_receive_after_stop_fails(radio: &impl Radio) {
    let result = tokio::time::timeout(Duration::from_secs(1), radio.receive())
        .await
        .expect("receive() on a stopped radio must not block");
    assert!(
        matches!(result, Err(RadioError::Stopped)),
        "receive() after stop should return Stopped, got {result:?}"
    );
}

/// Assert that a frame sent by `tx` arrives unchanged at `rx`.
///
/// Requires a medium without loss.
pub async fn assert_frame_delivered(tx: &impl Radio, rx: &impl Radio) {
    let frame = b"\x01\x02\x00\x05\x00\x00\x02hi";
    tx.transmit(frame).await.expect("transmit failed");
    let got = tokio::time::timeout(Duration::from_secs(1), rx.receive())
        .await
        .expect("frame not delivered within 1s")
        .expect("receive failed");
    assert_eq!(got, frame);
}

/// Run all checks that apply to a live radio.
pub async fn assert_pre_stop_conformance(radio: &impl Radio) {
    assert_has_name(radio);
    assert!(radio.is_online(), "radio should be online before stop()");
    assert_oversized_frame_rejected(radio).await;
    assert_mtu_frame_accepted(radio).await;
}

/// Run all stop-related checks.
pub async fn assert_stop_conformance(radio: &impl Radio) {
    assert_stop_is_clean(radio).await;
    assert_double_stop_is_idempotent(radio).await;
    assert_receive_after_stop_fails(radio).await;
}
