use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    database::{Database, RecordStore},
    storage::StorageError,
};

/// Static declaration of one database and the collections it serves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSpec {
    pub name: String,
    pub collections: Vec<String>,
}

impl DatabaseSpec {
    pub fn new(name: impl Into<String>, collections: &[&str]) -> Self {
        Self {
            name: name.into(),
            collections: collections.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Maps `(database, collection)` pairs to record stores. The set of pairs is
/// fixed when the router is built.
#[derive(Default)]
pub struct DatabaseRouter {
    databases: IndexMap<String, Arc<Database>>,
}

impl DatabaseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an opened database. A later database with the same name
    /// replaces the earlier one.
    pub fn register(&mut self, database: Database) {
        self.databases.insert(database.name().to_string(), Arc::new(database));
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.register(database);
        self
    }

    pub fn resolve(&self, database: &str, collection: &str) -> Result<RecordStore, StorageError> {
        let db = self
            .databases
            .get(database)
            .ok_or_else(|| StorageError::UnknownDatabase(database.to_string()))?;
        db.store(collection)
    }

    pub fn databases(&self) -> impl Iterator<Item = &Database> {
        self.databases.values().map(|db| db.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DatabaseState, StorageBackend};

    struct Volatile;

    impl StorageBackend for Volatile {
        fn load(&self) -> Result<Option<DatabaseState>, StorageError> {
            Ok(None)
        }

        fn persist(&self, _state: &DatabaseState, _changed: &str) -> Result<(), StorageError> {
            Ok(())
        }

        fn describe(&self) -> String {
            "volatile".to_string()
        }
    }

    fn router() -> DatabaseRouter {
        let specs = [
            DatabaseSpec::new("statements", &["statements", "standingorders", "standingorders_statements"]),
            DatabaseSpec::new("categories", &["categories"]),
        ];
        let mut router = DatabaseRouter::new();
        for spec in &specs {
            router.register(Database::open(&spec.name, &spec.collections, Box::new(Volatile)).unwrap());
        }
        router
    }

    #[test]
    fn test_resolves_declared_pairs() {
        let router = router();
        let store = router.resolve("statements", "standingorders_statements").unwrap();
        assert_eq!(store.database(), "statements");
        assert_eq!(store.collection(), "standingorders_statements");
        assert!(router.resolve("categories", "categories").is_ok());
    }

    #[test]
    fn test_unknown_database() {
        assert!(matches!(
            router().resolve("users", "categories"),
            Err(StorageError::UnknownDatabase(name)) if name == "users"
        ));
    }

    #[test]
    fn test_collection_of_another_database() {
        assert!(matches!(
            router().resolve("categories", "statements"),
            Err(StorageError::UnknownCollection { .. })
        ));
    }

    #[test]
    fn test_resolved_stores_share_data() {
        let router = router();
        let a = router.resolve("categories", "categories").unwrap();
        a.upsert_many(vec![crate::Record::new("c1", "x")]).unwrap();
        let b = router.resolve("categories", "categories").unwrap();
        assert_eq!(b.list().unwrap().len(), 1);
    }

    #[test]
    fn test_arbitrary_number_of_databases() {
        let mut router = DatabaseRouter::new();
        for i in 0..4 {
            let name = format!("db{i}");
            router.register(Database::open(&name, &["items"], Box::new(Volatile)).unwrap());
        }
        assert_eq!(router.databases().count(), 4);
        assert!(router.resolve("db3", "items").is_ok());
    }
}
