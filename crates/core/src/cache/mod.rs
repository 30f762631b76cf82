//! Named, versioned cache partitions.
//!
//! The router only ever talks to storage through [`CacheStorage`], which
//! covers exactly the operations a browser cache exposes: open a partition,
//! look a request up, put (overwrite) a response, delete a partition and
//! list partition names. [`CacheDb`] implements it on SQLite via
//! tokio-rusqlite:
//!
//! - Request identity is SHA-256 over method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Deleting a partition cascades to its entries

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod outbox;
pub mod partitions;

use async_trait::async_trait;

pub use crate::Error;
use crate::model::{CachedResponse, Request};

pub use connection::CacheDb;
pub use outbox::QueuedForm;

/// Cache storage operations used by the router and lifecycle.
///
/// Each call is independent; there are no cross-partition transactions.
/// Concurrent puts to the same key race and the last one wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the partition if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Look a request up in one partition.
    async fn match_in(&self, name: &str, request: &Request) -> Result<Option<CachedResponse>, Error>;

    /// Look a request up across every partition, oldest partition first.
    async fn match_any(&self, request: &Request) -> Result<Option<CachedResponse>, Error>;

    /// Store a response, replacing any previous entry for the request.
    /// Creates the partition lazily.
    async fn put(&self, name: &str, request: &Request, response: &CachedResponse) -> Result<(), Error>;

    /// Store several responses atomically: either all are committed or none.
    async fn put_all(&self, name: &str, entries: &[(Request, CachedResponse)]) -> Result<(), Error>;

    /// Drop a partition and its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Partition names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Number of entries stored in a partition (0 if it does not exist).
    async fn entry_count(&self, name: &str) -> Result<u64, Error>;
}
