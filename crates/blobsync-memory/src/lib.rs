//! Volatile storage backend for BlobSync.
//!
//! Keeps the last persisted state in memory. Nothing survives the process,
//! which makes it suitable for tests, benchmarks and throwaway servers.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::RwLock;

use blobsync_core::{DatabaseState, StorageBackend, StorageError};

#[derive(Default)]
struct Shared {
    saved: RwLock<Option<DatabaseState>>,
    writes: AtomicU64,
    fail_writes: AtomicBool,
}

/// In-memory backend. Clones share the same underlying snapshot, so a test
/// can keep a clone to inspect what the database persisted.
#[derive(Clone)]
pub struct InMemoryStorage {
    name: Arc<str>,
    shared: Arc<Shared>,
}

impl InMemoryStorage {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            shared: Arc::default(),
        }
    }

    /// Starts from an existing snapshot, as if it had been persisted before.
    pub fn with_state(name: &str, state: DatabaseState) -> Self {
        let storage = Self::new(name);
        *storage.shared.saved.write() = Some(state);
        storage
    }

    /// Number of successful `persist` calls.
    pub fn write_count(&self) -> u64 {
        self.shared.writes.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<DatabaseState> {
        self.shared.saved.read().clone()
    }

    /// Makes every following `persist` fail until switched off again.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl StorageBackend for InMemoryStorage {
    fn load(&self) -> Result<Option<DatabaseState>, StorageError> {
        Ok(self.snapshot())
    }

    fn persist(&self, state: &DatabaseState, changed: &str) -> Result<(), StorageError> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Other(format!("write to memory:{} refused", self.name)));
        }
        *self.shared.saved.write() = Some(state.clone());
        let writes = self.shared.writes.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(database = %self.name, changed, writes, "Snapshot stored");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobsync_core::{Database, Record};

    #[test]
    fn test_starts_empty() {
        let storage = InMemoryStorage::new("statements");
        assert!(storage.load().unwrap().is_none());
        assert_eq!(storage.write_count(), 0);
        assert_eq!(storage.describe(), "memory:statements");
    }

    #[test]
    fn test_clones_share_snapshot() {
        let storage = InMemoryStorage::new("categories");
        let db = Arc::new(Database::open("categories", &["categories"], Box::new(storage.clone())).unwrap());
        db.store("categories")
            .unwrap()
            .upsert_many(vec![Record::new("c1", "x"), Record::new("c2", "y")])
            .unwrap();

        assert_eq!(storage.write_count(), 1);
        let snapshot = storage.snapshot().unwrap();
        assert_eq!(snapshot["categories"].len(), 2);
    }

    #[test]
    fn test_injected_failure() {
        let storage = InMemoryStorage::new("categories");
        let db = Arc::new(Database::open("categories", &["categories"], Box::new(storage.clone())).unwrap());
        let store = db.store("categories").unwrap();

        storage.fail_writes(true);
        let err = store.upsert_many(vec![Record::new("c1", "x")]).unwrap_err();
        assert!(err.is_persistence_failure());
        assert!(store.list().unwrap().is_empty());

        storage.fail_writes(false);
        store.upsert_many(vec![Record::new("c1", "x")]).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn test_with_state_is_loaded() {
        let mut state = DatabaseState::new();
        state.insert("categories".to_string(), vec![Record::new("c9", "z")].into());
        let storage = InMemoryStorage::with_state("categories", state);
        let db = Arc::new(Database::open("categories", &["categories"], Box::new(storage)).unwrap());
        assert!(db.store("categories").unwrap().get("c9").is_ok());
    }
}
