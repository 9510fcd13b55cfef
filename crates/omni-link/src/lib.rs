#![no_std]
extern crate alloc;

pub mod handshake;
pub mod packet;
pub mod sequence;
pub mod session;

pub use packet::{build_wire_packet, Packet};
pub use sequence::SequenceCounter;
pub use session::{HandshakeState, Session};

/// Default bound on a single handshake read or write step.
pub const DEFAULT_IO_TIMEOUT_US: u64 = 5_000_000;

#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// Upper bound on how long one read/write step may keep seeing
    /// `WouldBlock`. `None` waits forever.
    pub io_timeout_us: Option<u64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { io_timeout_us: Some(DEFAULT_IO_TIMEOUT_US) }
    }
}
