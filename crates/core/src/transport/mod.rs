//! Byte transport abstraction for the serial link
//!
//! The link writes through one handle while the reader task polls a cloned
//! handle of the same port. Both sides go through [`Transport`] so tests can
//! substitute [`MockTransport`] for real hardware.

mod mock;
mod native;

pub use mock::MockTransport;
pub use native::NativePort;

use std::io;

/// Blocking byte transport to the device
pub trait Transport: Send {
    /// Write all bytes and flush
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes; returns 0 when nothing arrived before the timeout
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Number of bytes waiting in the input buffer
    fn bytes_available(&self) -> io::Result<usize>;

    /// Open a second handle to the same underlying port
    fn try_clone_box(&self) -> io::Result<Box<dyn Transport>>;
}
