//! Permission engine contracts
//!
//! The pieces of the permission engine the bridge consumes:
//! - `UserManager` / `User` - get-or-create user records
//! - `CachedData` - per-user, per-context single-flight cache
//! - `PermissionData` - flattened permissions and the check processors
//! - `ContextManager` - resolves the query options for a sender
//! - `PermissionStore` - where users' nodes live

pub mod cache;
pub mod calculator;
pub mod context;
pub mod node;
pub mod query;
pub mod storage;
pub mod user;

pub use cache::CachedData;
pub use calculator::{PermissionData, ResultCause, TristateResult};
pub use context::{ContextManager, StaticContextManager};
pub use node::Node;
pub use query::{ContextSet, QueryMode, QueryOptions};
pub use storage::{JsonStore, MemoryStore, PermissionStore};
pub use user::{User, UserManager, DEFAULT_LOAD_TIMEOUT};
