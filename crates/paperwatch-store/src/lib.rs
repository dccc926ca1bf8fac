//! Paperwatch Store - deduplicating SQLite persistence
//!
//! Owns the on-disk schema, its versioned migration history, and the
//! idempotent multi-key insertion that makes repeated fetch runs safe.

pub mod authors;
pub mod migrate;
pub mod store;

pub use migrate::SCHEMA_VERSION;
pub use store::{PaperStore, StoreStats};
