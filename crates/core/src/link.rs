//! Serial link to the robot
//!
//! [`SerialLink`] owns the write side of the port. The reader task gets a
//! [`LineReader`] holding a cloned handle, so the request path never reads
//! and the reader never writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{NativePort, Transport};
use crate::types::DriveCommand;
use crate::{CoreError, Result};

/// Lines longer than this without a terminator are discarded
pub const MAX_LINE_LEN: usize = 1024;

const READ_CHUNK: usize = 256;

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Port identifier, e.g. `/dev/ttyACM0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    /// Wait after opening while the board resets
    pub settle_delay: Duration,
    /// Upper bound for a single read on the native port
    pub read_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: crate::DEFAULT_BAUD_RATE,
            settle_delay: crate::DEFAULT_SETTLE_DELAY,
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl LinkConfig {
    /// Create with custom port and baud rate
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Owner of the serial connection
pub struct SerialLink {
    config: LinkConfig,
    transport: Option<Box<dyn Transport>>,
    /// Shared with line readers so they stop once the link goes down
    open: Arc<AtomicBool>,
}

impl SerialLink {
    /// Create a closed link
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            transport: None,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the configured port and wait for the device to settle.
    ///
    /// Blocks for the settle delay; call from a blocking context.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let port = NativePort::open(
            &self.config.port,
            self.config.baud_rate,
            self.config.read_timeout,
        )
        .map_err(|e| {
            tracing::error!("Failed to open {}: {}", self.config.port, e);
            CoreError::connection(&self.config.port, e)
        })?;

        self.attach(Box::new(port));
        Ok(())
    }

    /// Take over an already-open transport, then settle
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        if !self.config.settle_delay.is_zero() {
            tracing::debug!(
                "Waiting {:?} for {} to settle",
                self.config.settle_delay,
                self.config.port
            );
            std::thread::sleep(self.config.settle_delay);
        }

        self.transport = Some(transport);
        self.open.store(true, Ordering::SeqCst);
        tracing::info!(
            "Connected to {} at {} baud",
            self.config.port,
            self.config.baud_rate
        );
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.transport.is_some()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Write `command` followed by a newline
    pub fn write(&mut self, command: &str) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(CoreError::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(CoreError::NotConnected)?;

        let line = format!("{}\n", command);
        transport
            .write_all(line.as_bytes())
            .map_err(|e| CoreError::Write(e.to_string()))?;

        tracing::debug!("Wrote {:?} to {}", command, self.config.port);
        Ok(())
    }

    /// Flag cleared when this link is closed
    pub(crate) fn open_flag(&self) -> Arc<AtomicBool> {
        self.open.clone()
    }

    /// Reader over a cloned handle of this port
    pub fn line_reader(&self) -> Result<LineReader> {
        if !self.is_open() {
            return Err(CoreError::NotConnected);
        }
        let transport = self.transport.as_ref().ok_or(CoreError::NotConnected)?;
        let handle = transport.try_clone_box()?;
        Ok(LineReader::new(handle, self.open.clone()))
    }

    /// Send a final `stop` while the port is still held, then release it.
    ///
    /// Returns `true` if this call released the port.
    pub fn close(&mut self) -> bool {
        let Some(mut transport) = self.transport.take() else {
            return false;
        };

        self.open.store(false, Ordering::SeqCst);
        let stop = format!("{}\n", DriveCommand::Stop.word());
        if let Err(e) = transport.write_all(stop.as_bytes()) {
            tracing::warn!("Failed to send stop before closing {}: {}", self.config.port, e);
        }

        drop(transport);
        tracing::info!("Serial connection to {} closed", self.config.port);
        true
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Non-blocking line decoder over a read handle
pub struct LineReader {
    transport: Box<dyn Transport>,
    pending: Vec<u8>,
    open: Arc<AtomicBool>,
}

impl LineReader {
    fn new(transport: Box<dyn Transport>, open: Arc<AtomicBool>) -> Self {
        Self {
            transport,
            pending: Vec::with_capacity(READ_CHUNK),
            open,
        }
    }

    /// Return the next complete line, or `None` if none is buffered yet.
    ///
    /// Only reads bytes the port reports as available, so the call never
    /// waits longer than the port's read timeout.
    pub fn read_line_nonblocking(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.take_line()? {
            return Ok(Some(line));
        }

        let available = self.transport.bytes_available()?;
        if available == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; available.min(READ_CHUNK)];
        let n = self.transport.read(&mut buf)?;
        self.pending.extend_from_slice(&buf[..n]);

        self.take_line()
    }

    /// Whether the owning link is still open
    pub fn is_link_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn take_line(&mut self) -> Result<Option<String>> {
        match self.pending.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let raw: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8(raw).map_err(|e| CoreError::Decode(e.to_string()))?;
                Ok(Some(text.trim().to_string()))
            }
            None if self.pending.len() > MAX_LINE_LEN => {
                let len = self.pending.len();
                self.pending.clear();
                Err(CoreError::Decode(format!(
                    "{} bytes without line terminator",
                    len
                )))
            }
            None => Ok(None),
        }
    }
}
