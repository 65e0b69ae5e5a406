//! Core types and traits for BlobSync storage backends.
//!
//! This crate holds the record model, the upsert/merge rules for a
//! collection, and the `StorageBackend` trait that durable backends
//! implement in separate crates.

pub mod collection;
pub mod database;
pub mod models;
pub mod router;
pub mod storage;

// Re-export key types at crate root for convenience
pub use collection::Collection;
pub use database::{Database, RecordStore};
pub use models::{Record, RecordMeta};
pub use models::write::{parse_batch, UpsertSummary, ValidationError};
pub use router::{DatabaseRouter, DatabaseSpec};
pub use storage::{DatabaseState, StorageBackend, StorageError};
