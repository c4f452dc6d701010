//! Mesh node for the LoRa mesh stack.
//!
//! Ties the packet codec, session crypto, flood relay rules and a radio
//! together into a [`Node`], plus configuration, logging setup and the
//! simulator used by the `loramesh-sim` binary.

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod node;
pub mod outcome;
pub mod runtime;
pub mod simulation;

pub use config::{NodeConfig, NodeSettings};
pub use error::NodeError;
pub use event::NodeEvent;
pub use node::Node;
pub use outcome::HandleOutcome;
pub use runtime::NodeHandle;
pub use simulation::{ScriptReport, Simulation};
