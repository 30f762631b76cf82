//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Request classification rules
//! - Versioned cache partitions with a SQLite backend
//! - The cache-first / network-first / stale-while-revalidate router
//! - Install / activate lifecycle and admin messages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod model;
pub mod outbox;
pub mod router;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use lifecycle::{Registration, UpdateStatus, Worker, WorkerState};
pub use messages::{CacheStats, Message, Reply};
pub use model::{CachedResponse, Destination, PartitionNames, Request};
pub use outbox::{CONTACT_FORM_SYNC, Outbox, Submission, SyncReport};
pub use router::{Fetcher, Router, Served, Source};
pub use rules::{ResourceKind, RouteRules};
