//! Robot controller shared by the request handlers
//!
//! A [`Bridge`] owns the serial link, the response buffer and the reader
//! task. It is built once at startup and handed to the HTTP layer.
//!
//! Serial writes block until flushed or the port timeout expires, so every
//! touch of the link runs on the blocking pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::ResponseBuffer;
use crate::dispatcher::{CommandDispatcher, CommandPolicy};
use crate::link::{LinkConfig, SerialLink};
use crate::reader::{ReaderHandle, ReaderLoop};
use crate::types::ResponseEntry;
use crate::{CoreError, Result};

/// Text pushed when a command arrives while the link is down
pub const NOT_CONNECTED: &str = "Not connected to robot";

/// Runtime options for the bridge
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Sleep between reader polls
    pub poll_interval: Duration,
    /// Cap for the response buffer, `None` for unbounded
    pub max_responses: Option<usize>,
    pub policy: CommandPolicy,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval: crate::DEFAULT_POLL_INTERVAL,
            max_responses: None,
            policy: CommandPolicy::PassThrough,
        }
    }
}

/// Snapshot reported to the operator page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeStatus {
    pub connected: bool,
    pub port: String,
    pub baud_rate: u32,
    /// Last command word successfully written
    pub last_command: Option<String>,
}

/// Serial bridge controller
pub struct Bridge {
    link: Arc<Mutex<SerialLink>>,
    /// Cleared by `SerialLink::close`; read without taking the link lock
    connected: Arc<AtomicBool>,
    buffer: ResponseBuffer,
    dispatcher: CommandDispatcher,
    policy: CommandPolicy,
    reader: tokio::sync::Mutex<Option<ReaderHandle>>,
    last_command: Mutex<Option<String>>,
    port: String,
    baud_rate: u32,
}

impl Bridge {
    /// Open the configured port and start the reader.
    ///
    /// A connection failure is returned before any reader is spawned.
    pub async fn connect(config: LinkConfig, options: BridgeOptions) -> Result<Self> {
        let port = config.port.clone();
        let link = tokio::task::spawn_blocking(move || {
            let mut link = SerialLink::new(config);
            link.connect().map(|_| link)
        })
        .await
        .map_err(|e| CoreError::connection(&port, e))??;

        Self::start(link, options)
    }

    /// Start the reader on an already-open link.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(link: SerialLink, options: BridgeOptions) -> Result<Self> {
        let line_reader = link.line_reader()?;

        let buffer = match options.max_responses {
            Some(cap) => ResponseBuffer::bounded(cap),
            None => ResponseBuffer::new(),
        };

        let port = link.config().port.clone();
        let baud_rate = link.config().baud_rate;
        buffer.push(ResponseEntry::info(format!(
            "Connected to {} at {} baud",
            port, baud_rate
        )));

        let reader = ReaderLoop::new(line_reader, buffer.clone(), options.poll_interval).spawn();
        let connected = link.open_flag();

        Ok(Self {
            link: Arc::new(Mutex::new(link)),
            connected,
            buffer,
            dispatcher: CommandDispatcher::new(),
            policy: options.policy,
            reader: tokio::sync::Mutex::new(Some(reader)),
            last_command: Mutex::new(None),
            port,
            baud_rate,
        })
    }

    /// Resolve and write `code`, then drain the response buffer
    pub async fn send_command(&self, code: &str) -> Vec<ResponseEntry> {
        self.issue(code).await;
        self.responses()
    }

    /// Drain the response buffer without writing anything
    pub fn responses(&self) -> Vec<ResponseEntry> {
        self.buffer.drain_all()
    }

    pub fn buffer(&self) -> &ResponseBuffer {
        &self.buffer
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            connected: self.is_connected(),
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            last_command: lock(&self.last_command).clone(),
        }
    }

    /// Stop the reader, send a final stop and release the port.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let handle = self.reader.lock().await.take();
        if let Some(handle) = &handle {
            handle.stop();
        }

        let link = self.link.clone();
        let closed = tokio::task::spawn_blocking(move || {
            let mut link = lock(&link);
            link.close()
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Serial close task panicked: {}", e);
            false
        });
        if closed {
            self.buffer.push(ResponseEntry::info("Serial connection closed"));
        }

        if let Some(mut handle) = handle {
            handle.join().await;
        }
    }

    async fn issue(&self, code: &str) {
        if !self.is_connected() {
            tracing::warn!("Command {:?} dropped: link is closed", code);
            self.buffer.push(ResponseEntry::error(NOT_CONNECTED));
            return;
        }

        if self.policy == CommandPolicy::Reject && !self.dispatcher.is_known(code) {
            tracing::warn!("Rejected unknown command {:?}", code);
            let err = CoreError::UnknownCommand(code.to_string());
            self.buffer.push(ResponseEntry::error(err.to_string()));
            return;
        }

        let command = self.dispatcher.resolve(code).to_string();
        match self.write(command.clone()).await {
            Ok(()) => {
                tracing::info!("Sent {}", command);
                self.buffer.push(ResponseEntry::sent(command.as_str()));
                *lock(&self.last_command) = Some(command);
            }
            Err(CoreError::NotConnected) => {
                self.buffer.push(ResponseEntry::error(NOT_CONNECTED));
            }
            Err(e) => {
                tracing::warn!("Failed to send {}: {}", command, e);
                self.buffer
                    .push(ResponseEntry::error(format!("Error sending command: {}", e)));
            }
        }
    }

    async fn write(&self, command: String) -> Result<()> {
        let link = self.link.clone();
        tokio::task::spawn_blocking(move || {
            let mut link = lock(&link);
            link.write(&command)
        })
        .await
        .map_err(|e| CoreError::Write(e.to_string()))?
    }
}

// A panic while holding either lock leaves no partial state behind.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::types::EntryKind;
    use tokio::time::{sleep, timeout};

    fn options() -> BridgeOptions {
        BridgeOptions {
            poll_interval: Duration::from_millis(2),
            ..Default::default()
        }
    }

    fn start_bridge(mock: &MockTransport, options: BridgeOptions) -> Bridge {
        let config = LinkConfig::new("mock", 115_200).with_settle_delay(Duration::ZERO);
        let mut link = SerialLink::new(config);
        link.attach(Box::new(mock.clone()));
        let bridge = Bridge::start(link, options).unwrap();
        // Discard the connect notice
        bridge.responses();
        bridge
    }

    fn lines(entries: &[ResponseEntry]) -> Vec<String> {
        entries.iter().map(|e| e.line()).collect()
    }

    #[tokio::test]
    async fn test_connect_missing_port_fails() {
        let config = LinkConfig::new("/dev/robobridge_missing_port_12345", 115_200);
        let result = Bridge::connect(config, BridgeOptions::default()).await;
        assert!(matches!(result, Err(CoreError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_start_requires_open_link() {
        let link = SerialLink::new(LinkConfig::default());
        let result = Bridge::start(link, BridgeOptions::default());
        assert!(matches!(result, Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn test_start_reports_connection() {
        let mock = MockTransport::new();
        let config = LinkConfig::new("/dev/ttyUSB1", 9600).with_settle_delay(Duration::ZERO);
        let mut link = SerialLink::new(config);
        link.attach(Box::new(mock.clone()));
        let bridge = Bridge::start(link, options()).unwrap();

        assert_eq!(
            lines(&bridge.responses()),
            vec!["Connected to /dev/ttyUSB1 at 9600 baud"]
        );
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_forward_writes_and_acknowledges() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());

        let responses = bridge.send_command("f").await;
        assert_eq!(mock.written_str(), "forward\n");
        assert_eq!(lines(&responses), vec!["Sent: forward"]);
        assert_eq!(
            bridge.status().last_command.as_deref(),
            Some("forward")
        );

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_device_lines_drained_in_order() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());

        mock.push_incoming(b"line found\nturning\nline lost\n");
        timeout(Duration::from_secs(2), async {
            while bridge.buffer().len() < 3 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(
            lines(&bridge.responses()),
            vec!["Robot: line found", "Robot: turning", "Robot: line lost"]
        );
        assert!(bridge.responses().is_empty());

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_code_passes_through() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());

        let responses = bridge.send_command("speed 80").await;
        assert_eq!(mock.written_str(), "speed 80\n");
        assert_eq!(lines(&responses), vec!["Sent: speed 80"]);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_reject_policy_refuses_unknown_code() {
        let mock = MockTransport::new();
        let bridge = start_bridge(
            &mock,
            BridgeOptions {
                policy: CommandPolicy::Reject,
                ..options()
            },
        );

        let responses = bridge.send_command("x").await;
        assert!(mock.written().is_empty());
        assert_eq!(lines(&responses), vec!["Error: Unknown command: x"]);

        let responses = bridge.send_command("s").await;
        assert_eq!(lines(&responses), vec!["Sent: stop"]);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());
        mock.set_fail_writes(true);

        let responses = bridge.send_command("b").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, EntryKind::Error);
        assert_eq!(
            responses[0].line(),
            "Error: Error sending command: Write failed: mock write failure"
        );
        assert!(bridge.is_connected());

        mock.set_fail_writes(false);
        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_read_failure_keeps_write_side_usable() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());
        bridge.send_command("f").await;

        mock.set_fail_reads(true);
        timeout(Duration::from_secs(2), async {
            while bridge.buffer().is_empty() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        mock.set_fail_reads(false);

        let responses = bridge.send_command("s").await;
        assert_eq!(
            lines(&responses),
            vec!["Error: Serial communication failed", "Sent: stop"]
        );
        assert!(bridge.is_connected());

        bridge.shutdown().await;
        assert_eq!(mock.written_str(), "forward\nstop\nstop\n");
        assert_eq!(lines(&bridge.responses()), vec!["Serial connection closed"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_commands_write_whole_lines() {
        let mock = MockTransport::new();
        let bridge = std::sync::Arc::new(start_bridge(&mock, options()));

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let bridge = bridge.clone();
                let code = if i % 2 == 0 { "f" } else { "b" };
                tokio::spawn(async move { bridge.send_command(code).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let written = mock.written_str();
        let sent: Vec<&str> = written.lines().collect();
        assert_eq!(sent.len(), 10);
        assert!(sent.iter().all(|l| *l == "forward" || *l == "backward"));
        assert_eq!(sent.iter().filter(|l| **l == "forward").count(), 5);

        bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_sends_stop_and_is_idempotent() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());

        bridge.send_command("f").await;
        bridge.shutdown().await;
        bridge.shutdown().await;

        assert_eq!(mock.written_str(), "forward\nstop\n");
        assert_eq!(lines(&bridge.responses()), vec!["Serial connection closed"]);
        assert!(!bridge.status().connected);
    }

    #[tokio::test]
    async fn test_command_after_shutdown_reports_not_connected() {
        let mock = MockTransport::new();
        let bridge = start_bridge(&mock, options());
        bridge.shutdown().await;
        bridge.responses();

        let responses = bridge.send_command("f").await;
        assert_eq!(lines(&responses), vec!["Error: Not connected to robot"]);
        assert_eq!(mock.written_str(), "stop\n");
    }

    #[tokio::test]
    async fn test_bounded_buffer_option() {
        let mock = MockTransport::new();
        let bridge = start_bridge(
            &mock,
            BridgeOptions {
                max_responses: Some(2),
                ..options()
            },
        );

        bridge.send_command("f").await;
        // Responses are drained on every command, so fill directly
        bridge.buffer().push(ResponseEntry::device("a"));
        bridge.buffer().push(ResponseEntry::device("b"));
        bridge.buffer().push(ResponseEntry::device("c"));
        assert_eq!(lines(&bridge.responses()), vec!["Robot: b", "Robot: c"]);

        bridge.shutdown().await;
    }
}
