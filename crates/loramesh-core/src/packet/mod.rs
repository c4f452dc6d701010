pub mod kind;
pub mod wire;

pub use wire::Packet;
