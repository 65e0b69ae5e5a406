//! BlobSync: a small sync endpoint for client-encrypted records.
//!
//! Clients push and pull opaque blobs keyed by id, grouped into a fixed set
//! of `(database, collection)` pairs, and diff their local state against
//! the metadata listing.

use std::sync::Arc;

use axum::Router;

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod storage;

use config::Config;
use storage::StorageError;

/// Opens the configured databases and assembles the HTTP application.
pub fn build_app(config: &Config) -> Result<Router, StorageError> {
    let databases = Arc::new(storage::open_databases(&config.storage, &config.databases)?);
    Ok(api::router(
        databases,
        Arc::new(config.auth.clone()),
        config.server.max_body_bytes,
    ))
}
