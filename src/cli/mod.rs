//! Operator console
//!
//! - `Console` - colored terminal I/O
//! - `Command` - parsed operator commands
//! - `CommandExecutor` - runs commands against a bridge, gated by permissions

mod commands;
mod console;

pub use commands::{
    Command, CommandExecutor, CommandResult, EmergencyAction, TrustAction, COMMAND_NODE_PREFIX,
};
pub use console::Console;
