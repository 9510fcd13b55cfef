#![no_std]
#![forbid(unsafe_code)]

use omni_core::OmniError;

/// Reliable, ordered, connection-oriented byte stream to a controller.
///
/// A blocking driver simply never returns `WouldBlock`. Drivers with a
/// poll interval report an expired interval as `WouldBlock` so the session
/// can enforce its own deadline.
pub trait ByteStream: Send {
    /// Write some prefix of `bytes`. Returns how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> nb::Result<usize, OmniError>;

    /// Read into `buffer`. `Ok(0)` means the peer closed the stream.
    fn read(&mut self, buffer: &mut [u8]) -> nb::Result<usize, OmniError>;

    /// Idempotent. After this every read and write fails with `Transport`.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Monotonic time source used for handshake deadlines.
pub trait PlatformClock: Send + Sync {
    fn now_us(&self) -> u64;
}
