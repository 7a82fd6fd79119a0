pub mod core;
pub mod engine;
pub mod permissions;
pub mod sender;

// Runtime surface
pub mod bridge;
pub mod config;
pub mod housekeeping;
pub mod logging;

// Audit trail for permission checks
pub mod verbose;

// Operator console
pub mod cli;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use core::{BridgeError, BridgeResult, Tristate};
pub use permissions::PermissionResolver;
pub use sender::Sender;
