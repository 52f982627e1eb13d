//! Background reader draining device output into the response buffer
//!
//! Runs on a blocking thread (serial reads are blocking I/O) and polls the
//! port every `poll_interval`. Shutdown is cooperative: the stop flag and the
//! link's open flag are checked once per iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::buffer::ResponseBuffer;
use crate::link::LineReader;
use crate::types::ResponseEntry;
use crate::CoreError;

/// Text pushed when a line cannot be read or decoded
pub const COMM_FAILURE: &str = "Serial communication failed";

/// Reader task state
pub struct ReaderLoop {
    reader: LineReader,
    buffer: ResponseBuffer,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
}

impl ReaderLoop {
    pub fn new(reader: LineReader, buffer: ResponseBuffer, poll_interval: Duration) -> Self {
        Self {
            reader,
            buffer,
            poll_interval,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn the loop on the blocking pool
    pub fn spawn(self) -> ReaderHandle {
        let running = self.running.clone();
        let join = tokio::task::spawn_blocking(move || self.run());
        ReaderHandle {
            running,
            join: Some(join),
        }
    }

    /// Run until stopped, the link closes, or a read fails
    pub fn run(mut self) {
        tracing::debug!("Serial reader started");

        while self.running.load(Ordering::SeqCst) && self.reader.is_link_open() {
            if !self.poll_once() {
                break;
            }
            std::thread::sleep(self.poll_interval);
        }

        tracing::debug!("Serial reader stopped");
    }

    /// Read every complete line currently available.
    ///
    /// Returns `false` when the transport failed and the loop must end.
    fn poll_once(&mut self) -> bool {
        loop {
            match self.reader.read_line_nonblocking() {
                Ok(Some(line)) => {
                    if !line.is_empty() {
                        tracing::trace!("Device: {}", line);
                        self.buffer.push(ResponseEntry::device(line));
                    }
                }
                Ok(None) => return true,
                Err(CoreError::Decode(e)) => {
                    tracing::warn!("Undecodable line from device: {}", e);
                    self.buffer.push(ResponseEntry::error(COMM_FAILURE));
                }
                // Only the reader stops; the write side stays usable
                Err(e) => {
                    tracing::error!("Serial read failed: {}", e);
                    self.buffer.push(ResponseEntry::error(COMM_FAILURE));
                    return false;
                }
            }
        }
    }
}

/// Handle to a spawned reader
pub struct ReaderHandle {
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Ask the loop to exit; it notices within one poll interval
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }

    /// Wait for the loop to exit
    pub async fn join(&mut self) {
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!("Serial reader task panicked: {}", e);
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
