use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use blobsync_core::{parse_batch, DatabaseRouter, Record, RecordMeta, RecordStore, StorageError};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::{auth::auth_middleware, config::AuthConfig, error::ApiError};

/// Path segment that selects the metadata listing instead of a record id.
pub const META_SEGMENT: &str = "meta";

#[derive(Clone)]
pub struct AppState {
    databases: Arc<DatabaseRouter>,
}

impl AppState {
    pub fn new(databases: Arc<DatabaseRouter>) -> Self {
        Self { databases }
    }

    fn resolve(&self, db: &str, collection: &str) -> Result<RecordStore, ApiError> {
        self.databases.resolve(db, collection).map_err(|e| {
            tracing::debug!(db, collection, "Unknown db or collection");
            ApiError::from(e)
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
}

/// Builds the full HTTP surface. The access guard wraps every route,
/// including the not-found fallback.
pub fn router(databases: Arc<DatabaseRouter>, auth: Arc<AuthConfig>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/:db/:collection", get(list_records).post(upsert_records))
        .route("/:db/:collection/:id", get(get_record).delete(delete_record))
        .fallback(fallback)
        .with_state(AppState::new(databases))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(auth_middleware))
        .layer(Extension(auth))
        .layer(TraceLayer::new_for_http())
}

async fn fallback() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

/// Runs a store call on the blocking pool and waits for it. Writers hold the
/// database lock across a durable write, so readers of the same database
/// wait here too rather than on a runtime worker.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?
        .map_err(ApiError::from)
}

async fn list_records(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
) -> Result<Json<Vec<Record>>, ApiError> {
    metrics::increment_counter!("blobsync_requests_total", "op" => "list");
    let store = state.resolve(&db, &collection)?;
    tracing::debug!(db = %db, collection = %collection, "List records");
    Ok(Json(blocking(move || store.list()).await?))
}

async fn list_metadata(store: RecordStore) -> Result<Json<Vec<RecordMeta>>, ApiError> {
    metrics::increment_counter!("blobsync_requests_total", "op" => "meta");
    tracing::debug!(db = store.database(), collection = store.collection(), "List metadata");
    Ok(Json(blocking(move || store.list_metadata()).await?))
}

async fn get_record(
    State(state): State<AppState>,
    Path((db, collection, id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let store = state.resolve(&db, &collection)?;
    if id == META_SEGMENT {
        return Ok(list_metadata(store).await?.into_response());
    }

    metrics::increment_counter!("blobsync_requests_total", "op" => "get");
    tracing::debug!(db = %db, collection = %collection, id = %id, "Get record");
    let record = blocking(move || store.get(&id)).await?;
    Ok(Json(record).into_response())
}

async fn upsert_records(
    State(state): State<AppState>,
    Path((db, collection)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    metrics::increment_counter!("blobsync_requests_total", "op" => "upsert");
    let store = state.resolve(&db, &collection)?;

    let Json(body) = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(e.body_text())
        } else {
            ApiError::Validation(e.body_text())
        }
    })?;
    let records = parse_batch(body).map_err(|e| ApiError::Validation(e.to_string()))?;
    let submitted = records.len();

    let summary = blocking(move || store.upsert_many(records)).await?;
    metrics::counter!("blobsync_records_upserted_total", summary.count() as u64);
    tracing::info!(db = %db, collection = %collection, inserted = summary.inserted, updated = summary.updated, "Upsert");

    Ok(Json(UpsertResponse { ok: true, count: submitted }))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((db, collection, id)): Path<(String, String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    metrics::increment_counter!("blobsync_requests_total", "op" => "delete");
    let store = state.resolve(&db, &collection)?;

    let removed = {
        let id = id.clone();
        blocking(move || store.delete(&id)).await?
    };
    if removed {
        metrics::increment_counter!("blobsync_records_deleted_total");
    }
    tracing::info!(db = %db, collection = %collection, id = %id, removed, "Delete");

    Ok(Json(DeleteResponse { ok: true }))
}
