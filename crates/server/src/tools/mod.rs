//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server.

pub mod fetch;
pub mod forms;
pub mod lifecycle;
pub mod messages;

pub use fetch::SwFetchParams;
pub use forms::{FormSubmitParams, FormSyncParams};
pub use lifecycle::SwInstallParams;
