//! Radio boundary for the LoRa mesh stack.
//!
//! The mesh engine needs exactly two things from the physical layer: send
//! one frame, and wait for the next one. [`Radio`] captures that contract;
//! [`sim`] provides a lossy, delaying broadcast medium that implements it
//! for simulations and tests.

pub mod error;
pub mod shutdown;
pub mod sim;
pub mod testing;
pub mod traits;

pub use error::RadioError;
pub use shutdown::ShutdownToken;
pub use sim::{MediumConfig, MediumStats, SimMedium, SimRadio};
pub use traits::Radio;
