//! Domain types for robot control

mod command;
mod entry;

pub use command::DriveCommand;
pub use entry::{EntryKind, ResponseEntry};
