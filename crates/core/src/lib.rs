//! Robobridge Core - Serial bridge between an operator UI and a robot
//!
//! This crate provides:
//! - Serial link with settle delay and best-effort stop on close
//! - Background line reader feeding a shared response buffer
//! - Short-code command table
//! - Bridge controller tying them together
//! - Error types

use std::time::Duration;

// Defaults matching the robot firmware
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// Arduino-class boards reset when the port opens
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub mod bridge;
pub mod buffer;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod reader;
pub mod transport;
pub mod types;

// Re-export common types
pub use bridge::{Bridge, BridgeOptions, BridgeStatus};
pub use buffer::ResponseBuffer;
pub use dispatcher::{CommandDispatcher, CommandPolicy};
pub use error::{CoreError, Result};
pub use link::{LineReader, LinkConfig, SerialLink};
pub use reader::{ReaderHandle, ReaderLoop};
pub use transport::{MockTransport, NativePort, Transport};
pub use types::{DriveCommand, EntryKind, ResponseEntry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_defined() {
        assert_eq!(DEFAULT_SERIAL_PORT, "/dev/ttyACM0");
        assert_eq!(DEFAULT_BAUD_RATE, 115_200);
        assert!(DEFAULT_POLL_INTERVAL < DEFAULT_SETTLE_DELAY);
    }
}
