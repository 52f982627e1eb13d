//! Short-code command table
//!
//! Maps the single-letter codes sent by the operator page to the command
//! words the robot firmware understands.

use std::collections::HashMap;

use crate::types::DriveCommand;

/// How the bridge treats codes missing from the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPolicy {
    /// Write unknown codes to the device verbatim
    #[default]
    PassThrough,
    /// Refuse unknown codes without touching the link
    Reject,
}

/// Fixed lookup table from short code to drive command
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    table: HashMap<&'static str, DriveCommand>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        let table = DriveCommand::ALL
            .into_iter()
            .map(|cmd| (cmd.code(), cmd))
            .collect();
        Self { table }
    }

    /// Resolve `code` to the device command word.
    ///
    /// Codes absent from the table come back unchanged.
    pub fn resolve<'a>(&self, code: &'a str) -> &'a str {
        match self.table.get(code) {
            Some(cmd) => cmd.word(),
            None => code,
        }
    }

    /// Look up the drive command for `code`
    pub fn lookup(&self, code: &str) -> Option<DriveCommand> {
        self.table.get(code).copied()
    }

    pub fn is_known(&self, code: &str) -> bool {
        self.table.contains_key(code)
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
