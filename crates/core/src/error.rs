//! Error types for robobridge-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Failed to open {port}: {reason}")]
    Connection { port: String, reason: String },

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Build a connection error for `port`
    pub fn connection(port: &str, reason: impl ToString) -> Self {
        CoreError::Connection {
            port: port.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::NotConnected;
        assert_eq!(err.to_string(), "Not connected");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }

    #[test]
    fn test_connection_error_names_port() {
        let err = CoreError::connection("/dev/ttyACM0", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to open /dev/ttyACM0: No such file or directory"
        );
    }
}
