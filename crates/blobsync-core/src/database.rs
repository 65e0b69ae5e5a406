use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    collection::Collection,
    models::{
        write::{validate, UpsertSummary},
        Record, RecordMeta,
    },
    storage::{DatabaseState, StorageBackend, StorageError},
};

/// A named group of collections sharing one durable backend.
///
/// The database owns the in-memory copy of its state and is the only writer
/// of its backend. One lock covers all collections because they share a
/// backing file: mutations hold it exclusively across merge and persist,
/// reads share it.
pub struct Database {
    name: Arc<str>,
    collections: Vec<Arc<str>>,
    state: RwLock<DatabaseState>,
    backend: Box<dyn StorageBackend>,
}

impl Database {
    /// Loads the backend's last state and makes sure every declared
    /// collection exists. Collections found in storage but not declared are
    /// carried along on rewrites but are never routable.
    pub fn open<S: AsRef<str>>(
        name: &str,
        collections: &[S],
        backend: Box<dyn StorageBackend>,
    ) -> Result<Self, StorageError> {
        let mut state = backend.load()?.unwrap_or_default();

        for collection in collections {
            let collection = collection.as_ref();
            if !state.contains_key(collection) {
                state.insert(collection.to_string(), Collection::new());
            }
        }
        for existing in state.keys() {
            if !collections.iter().any(|c| c.as_ref() == existing.as_str()) {
                tracing::warn!(database = name, collection = %existing, "Stored collection is not declared; it will be kept but not served");
            }
        }

        let records: usize = state.values().map(Collection::len).sum();
        tracing::info!(database = name, location = %backend.describe(), records, "Database opened");

        Ok(Self {
            name: Arc::from(name),
            collections: collections.iter().map(|c| Arc::from(c.as_ref())).collect(),
            state: RwLock::new(state),
            backend,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.as_ref())
    }

    /// Hands out the store for a declared collection.
    pub fn store(self: &Arc<Self>, collection: &str) -> Result<RecordStore, StorageError> {
        let collection = self
            .collections
            .iter()
            .find(|c| c.as_ref() == collection)
            .ok_or_else(|| self.unknown_collection(collection))?;
        Ok(RecordStore {
            database: Arc::clone(self),
            collection: Arc::clone(collection),
        })
    }

    fn unknown_collection(&self, collection: &str) -> StorageError {
        StorageError::UnknownCollection {
            database: self.name.to_string(),
            collection: collection.to_string(),
        }
    }

    fn read<T>(&self, collection: &str, f: impl FnOnce(&Collection) -> T) -> Result<T, StorageError> {
        let state = self.state.read();
        let col = state.get(collection).ok_or_else(|| self.unknown_collection(collection))?;
        Ok(f(col))
    }

    fn upsert_many(&self, collection: &str, records: Vec<Record>) -> Result<UpsertSummary, StorageError> {
        // The whole batch is checked before anything is touched.
        for (index, record) in records.iter().enumerate() {
            validate(index, record)?;
        }
        if records.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let mut state = self.state.write();
        let mut next = state
            .get(collection)
            .ok_or_else(|| self.unknown_collection(collection))?
            .clone();
        let summary = next.upsert_many(records);
        self.commit(&mut state, collection, next)?;

        tracing::debug!(
            database = %self.name,
            collection,
            inserted = summary.inserted,
            updated = summary.updated,
            "Upserted records"
        );
        Ok(summary)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write();
        let current = state.get(collection).ok_or_else(|| self.unknown_collection(collection))?;
        if !current.contains(id) {
            return Ok(false);
        }

        let mut next = current.clone();
        next.remove(id);
        self.commit(&mut state, collection, next)?;

        tracing::debug!(database = %self.name, collection, id, "Deleted record");
        Ok(true)
    }

    /// Swaps `next` in and persists. On a failed write the previous
    /// collection is restored, so memory never runs ahead of storage.
    fn commit(&self, state: &mut DatabaseState, collection: &str, next: Collection) -> Result<(), StorageError> {
        let previous = match state.get_mut(collection) {
            Some(slot) => std::mem::replace(slot, next),
            None => return Err(self.unknown_collection(collection)),
        };

        if let Err(e) = self.backend.persist(state, collection) {
            tracing::error!(database = %self.name, collection, error = %e, "Failed to persist database");
            if let Some(slot) = state.get_mut(collection) {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Handle to one routable collection. Cheap to clone and `'static`, so it
/// can be moved onto a blocking thread.
#[derive(Clone)]
pub struct RecordStore {
    database: Arc<Database>,
    collection: Arc<str>,
}

impl RecordStore {
    pub fn database(&self) -> &str {
        self.database.name()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn list(&self) -> Result<Vec<Record>, StorageError> {
        self.database.read(&self.collection, Collection::to_vec)
    }

    pub fn list_metadata(&self) -> Result<Vec<RecordMeta>, StorageError> {
        self.database.read(&self.collection, Collection::metadata)
    }

    pub fn get(&self, id: &str) -> Result<Record, StorageError> {
        self.database
            .read(&self.collection, |col| col.get(id).cloned())?
            .ok_or_else(|| StorageError::RecordNotFound(id.to_string()))
    }

    /// Inserts or replaces every record by id and persists once.
    /// A single invalid record rejects the batch before anything changes.
    pub fn upsert_many(&self, records: Vec<Record>) -> Result<UpsertSummary, StorageError> {
        self.database.upsert_many(&self.collection, records)
    }

    /// Returns whether a record was removed. Only a removal is persisted.
    pub fn delete(&self, id: &str) -> Result<bool, StorageError> {
        self.database.delete(&self.collection, id)
    }
}
