//! Drive command types for operator input

use serde::{Deserialize, Serialize};

/// Motion command understood by the robot firmware
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DriveCommand {
    Forward,
    Backward,
    Stop,
}

impl DriveCommand {
    /// All commands in table order
    pub const ALL: [DriveCommand; 3] = [Self::Forward, Self::Backward, Self::Stop];

    /// Short code sent by the operator page
    pub fn code(self) -> &'static str {
        match self {
            Self::Forward => "f",
            Self::Backward => "b",
            Self::Stop => "s",
        }
    }

    /// Command word written to the device
    pub fn word(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Stop => "stop",
        }
    }

    /// Parse a short code
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.code() == code)
    }
}

impl std::fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.word())
    }
}
