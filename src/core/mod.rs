//! Core types shared by every part of the bridge
//!
//! - `Tristate` - Three-valued permission result
//! - `BridgeError` - Error types

pub mod error;
pub mod tristate;

pub use error::{BridgeError, BridgeResult};
pub use tristate::Tristate;
