//! Cross-process control: command format, delivery gating, file transport.

pub mod command;
pub mod file;

pub use command::{next_command_id, CommandGate, ControlAction, ControlCommand};
pub use file::FileChannel;
