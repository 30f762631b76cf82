//! Network side of swcache.
//!
//! This crate provides the reqwest-backed [`HttpFetcher`] the router and
//! outbox talk to, plus URL canonicalization for incoming requests.

pub mod fetch;

pub use fetch::{FetchConfig, HttpFetcher, UrlError, canonicalize, canonicalize_against};
