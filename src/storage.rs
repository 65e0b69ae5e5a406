use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::config::{StorageConfig, StorageKind};

// Re-export core storage types so callers only need crate::storage::*
pub use blobsync_core::{
    Database, DatabaseRouter, DatabaseSpec, DatabaseState, RecordStore, StorageBackend, StorageError,
};
pub use blobsync_memory::InMemoryStorage;
pub use blobsync_sqlite::SqliteStorage;

/// Stores a whole database as one pretty-printed JSON document mapping each
/// collection name to its array of records.
///
/// Writes go to a sibling temp file which is synced and then renamed over
/// the target, so readers of the file only ever see a complete document.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageBackend for JsonFileStorage {
    fn load(&self) -> Result<Option<DatabaseState>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn persist(&self, state: &DatabaseState, _changed: &str) -> Result<(), StorageError> {
        let data = serde_json::to_vec_pretty(state)?;
        let temp_path = self.temp_path();

        let written = write_synced(&temp_path, &data).and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(e.into());
        }
        if let Some(dir) = self.path.parent() {
            sync_directory(dir)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Makes a rename inside `dir` durable.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> std::io::Result<()> {
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    File::open(dir)?.sync_all()
}

// NTFS journals metadata; there is no directory handle to sync.
#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Opens every declared database on the configured backend.
pub fn open_databases(config: &StorageConfig, specs: &[DatabaseSpec]) -> Result<DatabaseRouter, StorageError> {
    if config.backend != StorageKind::Memory {
        fs::create_dir_all(&config.data_dir)?;
    }

    let mut router = DatabaseRouter::new();
    for spec in specs {
        let backend: Box<dyn StorageBackend> = match config.backend {
            StorageKind::Json => Box::new(JsonFileStorage::new(
                config.data_dir.join(format!("{}.json", spec.name)),
            )),
            StorageKind::Sqlite => {
                let path = config.data_dir.join(format!("{}.sqlite", spec.name));
                Box::new(SqliteStorage::new(&path.to_string_lossy())?)
            }
            StorageKind::Memory => Box::new(InMemoryStorage::new(&spec.name)),
        };
        router.register(Database::open(&spec.name, &spec.collections, backend)?);
    }
    Ok(router)
}
