//! SQLite storage backend for BlobSync.
//!
//! One SQLite file per logical database. Each record is a row holding its
//! JSON form; a persist rewrites the changed collection inside a single
//! transaction.

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use blobsync_core::{Collection, DatabaseState, Record, StorageBackend, StorageError};

pub struct SqliteStorage {
    conn: Mutex<Connection>,
    path: String,
}

fn sql_err(e: rusqlite::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(sql_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .map_err(sql_err)?;

        let storage = Self {
            conn: Mutex::new(conn),
            path: path.to_string(),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                position INTEGER NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_position
                ON records(collection, position);
            ",
        )
        .map_err(sql_err)?;
        Ok(())
    }
}

impl StorageBackend for SqliteStorage {
    fn load(&self) -> Result<Option<DatabaseState>, StorageError> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare("SELECT name FROM collections ORDER BY rowid")
            .map_err(sql_err)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;

        if names.is_empty() {
            return Ok(None);
        }

        let mut state = DatabaseState::new();
        for name in names {
            state.insert(name, Collection::new());
        }

        let mut stmt = conn
            .prepare("SELECT collection, body FROM records ORDER BY collection, position")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(sql_err)?;

        for row in rows {
            let (collection, body) = row.map_err(sql_err)?;
            let record: Record = serde_json::from_str(&body)?;
            state.entry(collection).or_default().upsert(record);
        }

        Ok(Some(state))
    }

    fn persist(&self, state: &DatabaseState, changed: &str) -> Result<(), StorageError> {
        let collection = state
            .get(changed)
            .ok_or_else(|| StorageError::Other(format!("collection {} missing from state", changed)))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(sql_err)?;

        for name in state.keys() {
            tx.execute("INSERT OR IGNORE INTO collections (name) VALUES (?1)", params![name])
                .map_err(sql_err)?;
        }

        tx.execute("DELETE FROM records WHERE collection = ?1", params![changed])
            .map_err(sql_err)?;
        {
            let mut insert = tx
                .prepare_cached(
                    "INSERT INTO records (collection, position, id, body) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(sql_err)?;
            for (position, record) in collection.iter().enumerate() {
                let body = serde_json::to_string(record)?;
                insert
                    .execute(params![changed, position as i64, record.id, body])
                    .map_err(sql_err)?;
            }
        }

        tx.commit().map_err(sql_err)?;
        tracing::debug!(path = %self.path, collection = changed, rows = collection.len(), "SQLite collection rewritten");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}
