//! Verbose auditing of permission checks
//!
//! Every resolution, including short-circuited ones, is offered to a
//! [`VerboseHandler`] so operators can see who was checked for what and why.

mod event;
mod handler;

pub use event::{
    CheckOrigin, PermissionCheckEvent, TrustBypassEvent, VerboseCheckTarget, VerboseEvent,
    PLATFORM_NAME,
};
pub use handler::{process_verbose_events, VerboseHandler, VerboseLog, VERBOSE_TARGET};
