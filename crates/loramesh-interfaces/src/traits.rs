//! The radio boundary trait.

use loramesh_core::constants::MAX_FRAME;

use crate::error::RadioError;

/// A half-duplex broadcast radio carrying whole mesh frames.
///
/// Transmission is best effort: `Ok` means the frame left this radio, not
/// that anyone heard it.
pub trait Radio: Send + Sync {
    /// Human-readable name for logs (e.g. "sim[2]").
    fn name(&self) -> &str;

    /// Largest frame the radio accepts.
    fn mtu(&self) -> usize {
        MAX_FRAME
    }

    /// Whether the radio can currently transmit and receive.
    fn is_online(&self) -> bool;

    /// Put one frame on the air.
    fn transmit(&self, frame: &[u8]) -> impl Future<Output = Result<(), RadioError>> + Send;

    /// Wait for the next frame heard by this radio.
    ///
    /// Returns [`RadioError::Stopped`] once the radio has been stopped.
    fn receive(&self) -> impl Future<Output = Result<Vec<u8>, RadioError>> + Send;

    /// Take the radio offline, releasing any pending [`receive`](Self::receive).
    ///
    /// Stopping twice is not an error.
    fn stop(&self) -> impl Future<Output = Result<(), RadioError>> + Send;
}
