//! Hardware transport backed by the `serialport` crate

use std::io::{self, Read, Write};
use std::time::Duration;

use super::Transport;

/// Native serial port handle
pub struct NativePort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

impl NativePort {
    /// Open `path` at `baud_rate` (8N1, no flow control)
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
        Ok(Self {
            port,
            name: path.to_string(),
        })
    }
}

impl Transport for NativePort {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn bytes_available(&self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }

    fn try_clone_box(&self) -> io::Result<Box<dyn Transport>> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
        }))
    }
}

impl std::fmt::Debug for NativePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let result = NativePort::open(
            "/dev/robobridge_missing_port_12345",
            115_200,
            Duration::from_millis(100),
        );
        assert!(result.is_err());
    }
}
