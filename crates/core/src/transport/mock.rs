//! In-memory transport for tests

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;

#[derive(Debug, Default)]
struct MockState {
    written: Vec<u8>,
    incoming: VecDeque<u8>,
    fail_writes: bool,
    fail_reads: bool,
}

/// Mock transport; clones share the same simulated port
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the device had sent them
    pub fn push_incoming(&self, data: &[u8]) {
        self.lock().incoming.extend(data.iter().copied());
    }

    /// Everything written to the device so far
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Written bytes as text
    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Make subsequent writes fail with `BrokenPipe`
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make subsequent reads fail with `BrokenPipe`
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock read failure"));
        }
        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn bytes_available(&self) -> io::Result<usize> {
        let state = self.lock();
        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock read failure"));
        }
        Ok(state.incoming.len())
    }

    fn try_clone_box(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_writes() {
        let mock = MockTransport::new();
        let mut handle = mock.try_clone_box().unwrap();
        handle.write_all(b"forward\n").unwrap();
        assert_eq!(mock.written(), b"forward\n");
    }

    #[test]
    fn test_mock_reads_incoming() {
        let mut mock = MockTransport::new();
        mock.push_incoming(b"ok\n");
        assert_eq!(mock.bytes_available().unwrap(), 3);

        let mut buf = [0u8; 2];
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ok");
        assert_eq!(mock.bytes_available().unwrap(), 1);
    }

    #[test]
    fn test_mock_failures() {
        let mut mock = MockTransport::new();
        mock.set_fail_writes(true);
        assert!(mock.write_all(b"x").is_err());
        mock.set_fail_reads(true);
        assert!(mock.bytes_available().is_err());
    }
}
