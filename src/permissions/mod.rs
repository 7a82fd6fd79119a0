//! Permission checks for host senders
//!
//! The resolver applies the checks in precedence order:
//! - **Console**: always `True`
//! - **Emergency shutdown**: `False` for everyone else
//! - **Cached data**: evaluated under the sender's query options
//!
//! `has_permission` additionally lets trusted senders through.
//!
//! ## Example
//!
//! ```rust,ignore
//! use perm_bridge::engine::{MemoryStore, StaticContextManager, UserManager};
//! use perm_bridge::permissions::PermissionResolver;
//! use perm_bridge::sender::Sender;
//! use perm_bridge::verbose::VerboseLog;
//! use std::sync::Arc;
//!
//! let users = Arc::new(UserManager::new(Arc::new(MemoryStore::new())));
//! let (verbose, _events) = VerboseLog::new();
//! let resolver = PermissionResolver::new(
//!     users,
//!     Arc::new(StaticContextManager::new()),
//!     Arc::new(verbose),
//! );
//!
//! if resolver.has_permission(&Sender::user(12345), "group.admin").await {
//!     // run the privileged command
//! }
//! ```

mod emergency;
mod registry;
mod resolver;
mod trust;

pub use emergency::EmergencyOptions;
pub use registry::PermissionRegistry;
pub use resolver::PermissionResolver;
pub use trust::TrustList;
