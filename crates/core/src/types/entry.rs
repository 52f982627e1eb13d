//! Response log entries shown to the operator

use serde::{Deserialize, Serialize};

/// Origin of a response entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Line received from the robot
    Device,
    /// Acknowledgement of a command written to the robot
    Sent,
    /// Transport or operator error
    Error,
    /// Lifecycle notice (connected, closed)
    Info,
}

/// Single timestamped line in the response buffer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEntry {
    /// Unix timestamp (milliseconds)
    pub timestamp_ms: u64,
    pub kind: EntryKind,
    pub text: String,
}

impl ResponseEntry {
    /// Create entry stamped with the current time
    pub fn new(kind: EntryKind, text: impl Into<String>) -> Self {
        Self {
            timestamp_ms: Self::now(),
            kind,
            text: text.into(),
        }
    }

    /// Line received from the robot
    pub fn device(text: impl Into<String>) -> Self {
        Self::new(EntryKind::Device, text)
    }

    /// Acknowledgement of a written command
    pub fn sent(text: impl Into<String>) -> Self {
        Self::new(EntryKind::Sent, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(EntryKind::Error, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(EntryKind::Info, text)
    }

    /// Display form, e.g. `Robot: ok` or `Sent: forward`
    pub fn line(&self) -> String {
        self.to_string()
    }

    fn now() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl std::fmt::Display for ResponseEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            EntryKind::Device => write!(f, "Robot: {}", self.text),
            EntryKind::Sent => write!(f, "Sent: {}", self.text),
            EntryKind::Error => write!(f, "Error: {}", self.text),
            EntryKind::Info => f.write_str(&self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = ResponseEntry::device("line found");
        assert_eq!(entry.kind, EntryKind::Device);
        assert_eq!(entry.text, "line found");
        assert!(entry.timestamp_ms > 0);
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(ResponseEntry::device("ok").line(), "Robot: ok");
        assert_eq!(ResponseEntry::sent("forward").line(), "Sent: forward");
        assert_eq!(
            ResponseEntry::error("Not connected to robot").line(),
            "Error: Not connected to robot"
        );
        assert_eq!(
            ResponseEntry::info("Serial connection closed").line(),
            "Serial connection closed"
        );
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_value(ResponseEntry::sent("stop")).unwrap();
        assert_eq!(json["kind"], "sent");
        assert_eq!(json["text"], "stop");
    }
}
